// Descriptor model for parsed .proto files.
// - A DescriptorSet owns every file handed to the generator.
// - Full names are dot separated, without a leading dot (`pkg.Outer.Inner`).
// - Field and method type references hold full names once the set is linked.

use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DescriptorSet {
    pub files: Vec<FileDescriptor>,
}

impl DescriptorSet {
    pub fn file(&self, name: &str) -> Option<&FileDescriptor> {
        self.files.iter().find(|f| f.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct FileDescriptor {
    /// Path as it is imported, always `/` separated.
    pub name: String,
    pub package: Option<String>,
    pub syntax: Option<String>,
    pub dependencies: Vec<String>,
    pub messages: Vec<MessageDescriptor>,
    pub enums: Vec<EnumDescriptor>,
    pub services: Vec<ServiceDescriptor>,
    pub options: FileOptions,
    pub syntax_comments: Comments,
    pub package_comments: Comments,
}

/// File options the generator carries over to its output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FileOptions {
    pub cc_generic_services: bool,
    pub java_generic_services: bool,
    pub py_generic_services: bool,
}

// ---------------- Message & Fields ----------------

#[derive(Debug, Clone, PartialEq, Default)]
pub struct MessageDescriptor {
    pub name: String,
    pub full_name: String,
    pub fields: Vec<FieldDescriptor>,
    pub messages: Vec<MessageDescriptor>,
    pub enums: Vec<EnumDescriptor>,
    pub comments: Comments,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    pub name: String,
    pub number: u32, // tag number
    pub cardinality: Cardinality,
    pub ty: FieldType,
    pub comments: Comments,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Cardinality {
    #[default]
    Singular,
    Repeated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    Scalar(ScalarType),
    Message(String),
    Enum(String),
    Map {
        key: ScalarType,
        value: Box<FieldType>,
    },
    /// Reference exactly as written in the source; replaced by `Message` or
    /// `Enum` when the set is linked.
    Named(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarType {
    Double,
    Float,
    Int32,
    Int64,
    Uint32,
    Uint64,
    Sint32,
    Sint64,
    Fixed32,
    Fixed64,
    Sfixed32,
    Sfixed64,
    Bool,
    String,
    Bytes,
}

impl ScalarType {
    pub fn from_keyword(s: &str) -> Option<Self> {
        let scalar = match s {
            "double" => ScalarType::Double,
            "float" => ScalarType::Float,
            "int32" => ScalarType::Int32,
            "int64" => ScalarType::Int64,
            "uint32" => ScalarType::Uint32,
            "uint64" => ScalarType::Uint64,
            "sint32" => ScalarType::Sint32,
            "sint64" => ScalarType::Sint64,
            "fixed32" => ScalarType::Fixed32,
            "fixed64" => ScalarType::Fixed64,
            "sfixed32" => ScalarType::Sfixed32,
            "sfixed64" => ScalarType::Sfixed64,
            "bool" => ScalarType::Bool,
            "string" => ScalarType::String,
            "bytes" => ScalarType::Bytes,
            _ => return None,
        };
        Some(scalar)
    }

    pub fn keyword(self) -> &'static str {
        match self {
            ScalarType::Double => "double",
            ScalarType::Float => "float",
            ScalarType::Int32 => "int32",
            ScalarType::Int64 => "int64",
            ScalarType::Uint32 => "uint32",
            ScalarType::Uint64 => "uint64",
            ScalarType::Sint32 => "sint32",
            ScalarType::Sint64 => "sint64",
            ScalarType::Fixed32 => "fixed32",
            ScalarType::Fixed64 => "fixed64",
            ScalarType::Sfixed32 => "sfixed32",
            ScalarType::Sfixed64 => "sfixed64",
            ScalarType::Bool => "bool",
            ScalarType::String => "string",
            ScalarType::Bytes => "bytes",
        }
    }
}

// ---------------- Enum ----------------

#[derive(Debug, Clone, PartialEq, Default)]
pub struct EnumDescriptor {
    pub name: String,
    pub full_name: String,
    pub values: Vec<EnumValueDescriptor>,
    pub allow_alias: bool,
    pub comments: Comments,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumValueDescriptor {
    pub name: String,
    pub number: i32,
    pub comments: Comments,
}

// ---------------- Service ----------------

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ServiceDescriptor {
    pub name: String,
    pub full_name: String,
    pub methods: Vec<MethodDescriptor>,
    pub comments: Comments,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct MethodDescriptor {
    pub name: String,
    pub input_type: String,
    pub output_type: String,
    pub client_streaming: bool,
    pub server_streaming: bool,
    /// String-valued extension options, `option (name) = "value";`, with the
    /// value unescaped.
    pub option_extensions: BTreeMap<String, String>,
    pub comments: Comments,
}

// ---------------- Comments ----------------

/// Documentation attached to one declaration, with comment markers removed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Comments {
    pub detached: Vec<String>,
    pub leading: String,
    pub trailing: String,
}

impl Comments {
    pub fn is_empty(&self) -> bool {
        self.detached.is_empty() && self.leading.is_empty() && self.trailing.is_empty()
    }
}
