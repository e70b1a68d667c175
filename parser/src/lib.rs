mod comments;
mod link;
mod load;
mod model;

use pest::Parser as _;
use pest::iterators::Pair;
use pest_derive::Parser;
use std::fmt;
use std::fs;
use std::path::Path;

use comments::CommentIndex;

pub use load::load_descriptor_set;
pub use model::*;

#[derive(Parser)]
#[grammar = "resources/proto.pest"] // Path relative to the crate's src directory
pub struct ProtoParser;

#[derive(Debug)]
pub enum ParseError {
    Io(std::io::Error),
    Pest(Box<pest::error::Error<Rule>>),
    Message(&'static str),
    InvalidNumber(String),
    ImportNotFound { import: String, from: String },
    UnresolvedType { type_name: String, scope: String },
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Io(e) => write!(f, "IO error: {}", e),
            ParseError::Pest(e) => write!(f, "Parse error: {}", e),
            ParseError::Message(m) => write!(f, "{}", m),
            ParseError::InvalidNumber(n) => write!(f, "number out of range: {}", n),
            ParseError::ImportNotFound { import, from } => {
                write!(f, "import \"{}\" of {} not found", import, from)
            }
            ParseError::UnresolvedType { type_name, scope } => {
                write!(f, "type \"{}\" used in {} is not defined", type_name, scope)
            }
        }
    }
}

impl std::error::Error for ParseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ParseError::Io(e) => Some(e),
            ParseError::Pest(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ParseError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}
impl From<pest::error::Error<Rule>> for ParseError {
    fn from(e: pest::error::Error<Rule>) -> Self {
        Self::Pest(Box::new(e))
    }
}

// Public API: parse a single .proto file into an unlinked FileDescriptor.
// The file is named after the path it was read from.
pub fn parse_proto_file<P: AsRef<Path>>(path: P) -> Result<FileDescriptor, ParseError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)?;
    let name = path.to_string_lossy().replace('\\', "/");
    parse_proto_str(&name, &content)
}

pub fn parse_proto_str(name: &str, content: &str) -> Result<FileDescriptor, ParseError> {
    let mut pairs = ProtoParser::parse(Rule::proto, content)?;
    let proto_pair = pairs
        .next()
        .ok_or(ParseError::Message("expected proto root"))?;
    let comments = CommentIndex::new(content, &proto_pair)?;
    parse_proto(name, proto_pair, &comments)
}

fn parse_proto(
    name: &str,
    pair: Pair<Rule>,
    comments: &CommentIndex,
) -> Result<FileDescriptor, ParseError> {
    let mut file = FileDescriptor {
        name: name.to_string(),
        ..Default::default()
    };

    // Declarations may precede the package statement, so read it first.
    file.package = pair
        .clone()
        .into_inner()
        .find(|p| p.as_rule() == Rule::package_statement)
        .and_then(|p| p.into_inner().find(|x| x.as_rule() == Rule::full_ident))
        .map(|p| p.as_str().to_string());
    let scope = file.package.clone().unwrap_or_default();

    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::syntax_statement => {
                file.syntax_comments = comments.attach_to(&inner);
                file.syntax = inner
                    .into_inner()
                    .find(|p| p.as_rule() == Rule::string_literal)
                    .map(string_value);
            }
            Rule::package_statement => file.package_comments = comments.attach_to(&inner),
            Rule::import_statement => {
                if let Some(path) = inner
                    .into_inner()
                    .find(|p| p.as_rule() == Rule::string_literal)
                {
                    file.dependencies.push(string_value(path));
                }
            }
            Rule::option_statement => {
                if let Some((name, value)) = parse_option(inner) {
                    let enabled = value.as_str() == "true";
                    match name.as_str() {
                        "cc_generic_services" => file.options.cc_generic_services = enabled,
                        "java_generic_services" => file.options.java_generic_services = enabled,
                        "py_generic_services" => file.options.py_generic_services = enabled,
                        _ => {}
                    }
                }
            }
            Rule::message_block => {
                file.messages
                    .push(parse_message_block(inner, &scope, comments)?);
            }
            Rule::enum_block => file.enums.push(parse_enum_block(inner, &scope, comments)?),
            Rule::service_block => {
                file.services
                    .push(parse_service_block(inner, &scope, comments)?);
            }
            _ => {}
        }
    }

    Ok(file)
}

fn qualify(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{}.{name}", parent)
    }
}

fn parse_message_block(
    block: Pair<Rule>,
    scope: &str,
    comments: &CommentIndex,
) -> Result<MessageDescriptor, ParseError> {
    // message_block = { kw_message ~ message_name ~ message_body }
    let mut message = MessageDescriptor {
        comments: comments.attach_to(&block),
        ..Default::default()
    };
    let mut body_opt: Option<Pair<Rule>> = None;

    for p in block.into_inner() {
        match p.as_rule() {
            Rule::message_name => {
                message.name = p.as_str().to_string();
                message.full_name = qualify(scope, &message.name);
            }
            Rule::message_body => body_opt = Some(p),
            _ => {}
        }
    }

    let Some(body) = body_opt else {
        return Ok(message);
    };
    for elem in body.into_inner() {
        match elem.as_rule() {
            Rule::field => message.fields.push(parse_field(elem, comments)?),
            Rule::map_field => message.fields.push(parse_map_field(elem, comments)?),
            Rule::oneof => {
                // Flatten oneof members into the message's fields
                for f in elem.into_inner() {
                    if f.as_rule() == Rule::oneof_field {
                        message.fields.push(parse_field(f, comments)?);
                    }
                }
            }
            Rule::message_block => {
                let nested = parse_message_block(elem, &message.full_name, comments)?;
                message.messages.push(nested);
            }
            Rule::enum_block => {
                let nested = parse_enum_block(elem, &message.full_name, comments)?;
                message.enums.push(nested);
            }
            _ => {}
        }
    }

    Ok(message)
}

fn parse_enum_block(
    block: Pair<Rule>,
    scope: &str,
    comments: &CommentIndex,
) -> Result<EnumDescriptor, ParseError> {
    // enum_block = { kw_enum ~ enum_name ~ enum_body }
    let mut en = EnumDescriptor {
        comments: comments.attach_to(&block),
        ..Default::default()
    };

    for p in block.into_inner() {
        match p.as_rule() {
            Rule::enum_name => {
                en.name = p.as_str().to_string();
                en.full_name = qualify(scope, &en.name);
            }
            Rule::enum_body => {
                for eb in p.into_inner() {
                    match eb.as_rule() {
                        Rule::enum_field => en.values.push(parse_enum_field(eb, comments)?),
                        Rule::option_statement => {
                            if let Some((name, value)) = parse_option(eb)
                                && name == "allow_alias"
                            {
                                en.allow_alias = value.as_str() == "true";
                            }
                        }
                        _ => {}
                    }
                }
            }
            _ => {}
        }
    }

    Ok(en)
}

fn parse_enum_field(
    pair: Pair<Rule>,
    comments: &CommentIndex,
) -> Result<EnumValueDescriptor, ParseError> {
    // enum_field = { enum_field_name ~ "=" ~ enum_field_value ~ field_options? ~ ";" }
    let doc = comments.attach_to(&pair);
    let mut name: Option<String> = None;
    let mut number: Option<i32> = None;
    for ef in pair.into_inner() {
        match ef.as_rule() {
            Rule::enum_field_name => name = Some(ef.as_str().to_string()),
            Rule::enum_field_value => {
                let n = parse_integer_value(&ef)?;
                number = Some(
                    i32::try_from(n).map_err(|_| ParseError::InvalidNumber(n.to_string()))?,
                );
            }
            _ => {}
        }
    }
    match (name, number) {
        (Some(name), Some(number)) => Ok(EnumValueDescriptor {
            name,
            number,
            comments: doc,
        }),
        _ => Err(ParseError::Message("malformed enum value")),
    }
}

fn parse_field(pair: Pair<Rule>, comments: &CommentIndex) -> Result<FieldDescriptor, ParseError> {
    // field = { field_modifier? ~ type_reference ~ field_name ~ "=" ~ tag ~ field_options? ~ ";" }
    let doc = comments.attach_to(&pair);
    let mut cardinality = Cardinality::Singular;
    let mut ty_opt: Option<FieldType> = None;
    let mut name_opt: Option<String> = None;
    let mut number_opt: Option<u32> = None;

    for p in pair.into_inner() {
        match p.as_rule() {
            Rule::field_modifier => {
                if p.as_str() == "repeated" {
                    cardinality = Cardinality::Repeated;
                }
            }
            Rule::type_reference => ty_opt = Some(parse_type_reference(p)),
            Rule::field_name => name_opt = Some(p.as_str().to_string()),
            Rule::tag => number_opt = Some(parse_tag(&p)?),
            _ => {}
        }
    }

    match (ty_opt, name_opt, number_opt) {
        (Some(ty), Some(name), Some(number)) => Ok(FieldDescriptor {
            name,
            number,
            cardinality,
            ty,
            comments: doc,
        }),
        _ => Err(ParseError::Message("malformed field")),
    }
}

fn parse_map_field(
    pair: Pair<Rule>,
    comments: &CommentIndex,
) -> Result<FieldDescriptor, ParseError> {
    // map_field = { kw_map ~ "<" ~ scalar_type ~ "," ~ type_reference ~ ">" ~ field_name ~ "=" ~ tag ... }
    let doc = comments.attach_to(&pair);
    let mut key: Option<ScalarType> = None;
    let mut value: Option<FieldType> = None;
    let mut name_opt: Option<String> = None;
    let mut number_opt: Option<u32> = None;

    for p in pair.into_inner() {
        match p.as_rule() {
            Rule::scalar_type => key = ScalarType::from_keyword(p.as_str()),
            Rule::type_reference => value = Some(parse_type_reference(p)),
            Rule::field_name => name_opt = Some(p.as_str().to_string()),
            Rule::tag => number_opt = Some(parse_tag(&p)?),
            _ => {}
        }
    }

    match (key, value, name_opt, number_opt) {
        (Some(key), Some(value), Some(name), Some(number)) => Ok(FieldDescriptor {
            name,
            number,
            cardinality: Cardinality::Singular,
            ty: FieldType::Map {
                key,
                value: Box::new(value),
            },
            comments: doc,
        }),
        _ => Err(ParseError::Message("malformed map field")),
    }
}

fn parse_service_block(
    block: Pair<Rule>,
    scope: &str,
    comments: &CommentIndex,
) -> Result<ServiceDescriptor, ParseError> {
    let mut service = ServiceDescriptor {
        comments: comments.attach_to(&block),
        ..Default::default()
    };

    for p in block.into_inner() {
        match p.as_rule() {
            Rule::service_name => {
                service.name = p.as_str().to_string();
                service.full_name = qualify(scope, &service.name);
            }
            Rule::rpc => service.methods.push(parse_rpc(p, comments)?),
            _ => {}
        }
    }

    Ok(service)
}

fn parse_rpc(pair: Pair<Rule>, comments: &CommentIndex) -> Result<MethodDescriptor, ParseError> {
    // rpc = { kw_rpc ~ rpc_name ~ "(" ~ rpc_input ~ ")" ~ kw_returns ~ "(" ~ rpc_output ~ ")" ~ (rpc_body | ";") }
    let mut method = MethodDescriptor {
        comments: comments.attach_to(&pair),
        ..Default::default()
    };

    for p in pair.into_inner() {
        match p.as_rule() {
            Rule::rpc_name => method.name = p.as_str().to_string(),
            Rule::rpc_input => {
                let (streaming, ty) = parse_rpc_type(p);
                method.client_streaming = streaming;
                method.input_type = ty;
            }
            Rule::rpc_output => {
                let (streaming, ty) = parse_rpc_type(p);
                method.server_streaming = streaming;
                method.output_type = ty;
            }
            Rule::rpc_body => {
                for option in p.into_inner() {
                    if option.as_rule() != Rule::option_statement {
                        continue;
                    }
                    // Only `(extension) = "string"` options are carried
                    if let Some((name, value)) = parse_option(option)
                        && let Some(extension) = extension_name(&name)
                        && value.as_rule() == Rule::string_concat
                    {
                        method
                            .option_extensions
                            .insert(extension.to_string(), string_value(value));
                    }
                }
            }
            _ => {}
        }
    }

    if method.input_type.is_empty() || method.output_type.is_empty() {
        return Err(ParseError::Message("malformed rpc"));
    }
    Ok(method)
}

fn parse_rpc_type(pair: Pair<Rule>) -> (bool, String) {
    let mut streaming = false;
    let mut ty = String::new();
    for p in pair.into_inner() {
        match p.as_rule() {
            Rule::stream_modifier => streaming = true,
            Rule::type_name => ty = p.as_str().to_string(),
            _ => {}
        }
    }
    (streaming, ty)
}

/// Returns the option's name with whitespace removed and the pair holding its value.
fn parse_option(pair: Pair<Rule>) -> Option<(String, Pair<Rule>)> {
    // option_statement = { kw_option ~ option_name ~ "=" ~ constant ~ ";" }
    let mut name: Option<String> = None;
    let mut value: Option<Pair<Rule>> = None;
    for p in pair.into_inner() {
        match p.as_rule() {
            Rule::option_name => name = Some(p.as_str().split_whitespace().collect()),
            Rule::constant => value = p.into_inner().next(),
            _ => {}
        }
    }
    Some((name?, value?))
}

/// `(foo.bar)` -> `foo.bar`; names with a field path after the extension are skipped.
fn extension_name(option_name: &str) -> Option<&str> {
    let inner = option_name.strip_prefix('(')?.strip_suffix(')')?;
    if inner.contains(['(', ')']) {
        return None;
    }
    Some(inner.strip_prefix('.').unwrap_or(inner))
}

/// Decoded contents of a string literal, or of adjacent literals joined.
fn string_value(pair: Pair<Rule>) -> String {
    match pair.as_rule() {
        Rule::string_literal => pair
            .into_inner()
            .next()
            .map(|p| unescape(p.as_str()))
            .unwrap_or_default(),
        _ => pair.into_inner().map(string_value).collect(),
    }
}

// Unknown escapes keep the escaped character; byte escapes that do not form
// UTF-8 are replaced.
fn unescape(raw: &str) -> String {
    let mut bytes = Vec::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            let mut buf = [0; 4];
            bytes.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            continue;
        }
        let Some(e) = chars.next() else {
            bytes.push(b'\\');
            break;
        };
        match e {
            'n' => bytes.push(b'\n'),
            'r' => bytes.push(b'\r'),
            't' => bytes.push(b'\t'),
            'a' => bytes.push(0x07),
            'b' => bytes.push(0x08),
            'f' => bytes.push(0x0c),
            'v' => bytes.push(0x0b),
            'x' | 'X' => {
                let mut value = 0u8;
                let mut digits = 0;
                while digits < 2
                    && let Some(d) = chars.peek().and_then(|d| d.to_digit(16))
                {
                    value = value * 16 + d as u8;
                    chars.next();
                    digits += 1;
                }
                bytes.push(value);
            }
            '0'..='7' => {
                let mut value = e.to_digit(8).unwrap_or(0);
                let mut digits = 1;
                while digits < 3
                    && let Some(d) = chars.peek().and_then(|d| d.to_digit(8))
                {
                    value = value * 8 + d;
                    chars.next();
                    digits += 1;
                }
                bytes.push(value as u8);
            }
            'u' | 'U' => {
                let width = if e == 'u' { 4 } else { 8 };
                let mut value = 0u32;
                for _ in 0..width {
                    let Some(d) = chars.peek().and_then(|d| d.to_digit(16)) else {
                        break;
                    };
                    value = value.saturating_mul(16).saturating_add(d);
                    chars.next();
                }
                let c = char::from_u32(value).unwrap_or(char::REPLACEMENT_CHARACTER);
                let mut buf = [0; 4];
                bytes.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            }
            other => {
                let mut buf = [0; 4];
                bytes.extend_from_slice(other.encode_utf8(&mut buf).as_bytes());
            }
        }
    }
    String::from_utf8_lossy(&bytes).into_owned()
}

fn parse_type_reference(pair: Pair<Rule>) -> FieldType {
    // type_reference = { scalar_type | type_name }
    let mut inners = pair.clone().into_inner();
    if let Some(first) = inners.next()
        && first.as_rule() == Rule::scalar_type
        && let Some(scalar) = ScalarType::from_keyword(first.as_str())
    {
        return FieldType::Scalar(scalar);
    }
    FieldType::Named(pair.as_str().to_string())
}

fn parse_tag(pair: &Pair<Rule>) -> Result<u32, ParseError> {
    let n = parse_integer_value(pair)?;
    u32::try_from(n).map_err(|_| ParseError::InvalidNumber(n.to_string()))
}

fn parse_integer_value(pair: &Pair<Rule>) -> Result<i64, ParseError> {
    // integer_value = dec|hex|oct with optional minus
    let s = pair.as_str().trim();
    let (neg, rest) = if let Some(stripped) = s.strip_prefix('-') {
        (true, stripped)
    } else {
        (false, s)
    };
    let parsed = if let Some(hex) = rest.strip_prefix("0x").or_else(|| rest.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16)
    } else if rest.starts_with('0') && rest.len() > 1 {
        // Octal per grammar
        i64::from_str_radix(&rest[1..], 8)
    } else {
        rest.parse::<i64>()
    };
    let value = parsed.map_err(|_| ParseError::InvalidNumber(s.to_string()))?;
    Ok(if neg { -value } else { value })
}
