use std::collections::HashSet;

use parser::{
    Cardinality, EnumDescriptor, FieldDescriptor, FieldType, FileDescriptor, FileOptions,
    MessageDescriptor, MethodDescriptor, ServiceDescriptor,
};
use tracing::debug;

use crate::comments::{indent, with_comments};
use crate::{Closure, DescriptorIndex, MergeError, Qualifier};

/// Render the merged file: header, enums, messages, then the root services.
pub(crate) fn render(
    root: &FileDescriptor,
    index: &DescriptorIndex<'_>,
    closure: &Closure,
    qualifier: &Qualifier<'_>,
) -> Result<String, MergeError> {
    let emitter = Emitter { qualifier };
    let mut out = String::new();

    out.push_str(&with_comments(
        "syntax = \"proto3\";\n",
        &root.syntax_comments,
        0,
    ));
    if let Some(package) = root.package.as_deref().filter(|p| !p.is_empty()) {
        out.push_str(&with_comments(
            &format!("package {package};\n"),
            &root.package_comments,
            0,
        ));
    }
    out.push_str(&file_options(&root.options));

    let mut emitted: HashSet<&str> = HashSet::new();
    for id in &closure.enums {
        let en = index.enum_descriptor(*id);
        mark_emitted(&mut emitted, &en.full_name)?;
        debug!(type_name = %en.full_name, "emitting enum");
        out.push('\n');
        out.push_str(&with_comments(&emitter.enum_definition(en), &en.comments, 0));
    }
    for id in &closure.messages {
        let message = index.message(*id);
        mark_emitted(&mut emitted, &message.full_name)?;
        debug!(type_name = %message.full_name, "emitting message");
        out.push('\n');
        out.push_str(&with_comments(
            &emitter.message_definition(message),
            &message.comments,
            0,
        ));
    }

    for service in &root.services {
        out.push('\n');
        out.push_str(&with_comments(
            &emitter.service_definition(service),
            &service.comments,
            0,
        ));
    }

    Ok(out)
}

fn mark_emitted<'a>(emitted: &mut HashSet<&'a str>, name: &'a str) -> Result<(), MergeError> {
    if emitted.insert(name) {
        Ok(())
    } else {
        Err(MergeError::DuplicateDefinition(name.to_string()))
    }
}

fn file_options(options: &FileOptions) -> String {
    let mut s = String::new();
    for (name, enabled) in [
        ("cc_generic_services", options.cc_generic_services),
        ("java_generic_services", options.java_generic_services),
        ("py_generic_services", options.py_generic_services),
    ] {
        if enabled {
            s.push_str(&format!("option {name} = true;\n"));
        }
    }
    s
}

/// Double-quoted proto string literal for `value`.
fn quote(value: &str) -> String {
    let mut s = String::with_capacity(value.len() + 2);
    s.push('"');
    for c in value.chars() {
        match c {
            '"' => s.push_str("\\\""),
            '\\' => s.push_str("\\\\"),
            '\n' => s.push_str("\\n"),
            '\r' => s.push_str("\\r"),
            '\t' => s.push_str("\\t"),
            c if c.is_control() => s.push_str(&format!("\\x{:02x}", c as u32)),
            c => s.push(c),
        }
    }
    s.push('"');
    s
}

struct Emitter<'q, 'a> {
    qualifier: &'q Qualifier<'a>,
}

impl Emitter<'_, '_> {
    fn message_definition(&self, message: &MessageDescriptor) -> String {
        let mut s = format!("message {} {{\n", self.qualifier.qualify(&message.full_name));
        for sub in &message.messages {
            s.push_str(&with_comments(
                &indent(&self.message_definition(sub), 4),
                &sub.comments,
                4,
            ));
        }
        for sub in &message.enums {
            s.push_str(&with_comments(
                &indent(&self.enum_definition(sub), 4),
                &sub.comments,
                4,
            ));
        }
        for field in &message.fields {
            s.push_str(&with_comments(
                &format!("    {}\n", self.field_definition(field)),
                &field.comments,
                4,
            ));
        }
        s.push_str("}\n");
        s
    }

    fn field_definition(&self, field: &FieldDescriptor) -> String {
        let label = match field.cardinality {
            Cardinality::Repeated => "repeated ",
            Cardinality::Singular => "",
        };
        format!(
            "{label}{} {} = {};",
            self.type_name(&field.ty),
            field.name,
            field.number
        )
    }

    fn type_name(&self, ty: &FieldType) -> String {
        match ty {
            FieldType::Scalar(scalar) => scalar.keyword().to_string(),
            FieldType::Message(name) | FieldType::Enum(name) | FieldType::Named(name) => {
                self.qualifier.qualify(name)
            }
            FieldType::Map { key, value } => {
                format!("map<{}, {}>", key.keyword(), self.type_name(value))
            }
        }
    }

    fn enum_definition(&self, en: &EnumDescriptor) -> String {
        let mut s = format!("enum {} {{\n", self.qualifier.qualify(&en.full_name));
        if en.allow_alias {
            s.push_str("    option allow_alias = true;\n");
        }
        for value in &en.values {
            s.push_str(&with_comments(
                &format!("    {} = {};\n", value.name, value.number),
                &value.comments,
                4,
            ));
        }
        s.push_str("}\n");
        s
    }

    fn service_definition(&self, service: &ServiceDescriptor) -> String {
        let mut s = format!("service {} {{\n", service.name);
        for method in &service.methods {
            s.push_str(&with_comments(
                &indent(&self.method_definition(method), 4),
                &method.comments,
                4,
            ));
        }
        s.push_str("}\n");
        s
    }

    fn method_definition(&self, method: &MethodDescriptor) -> String {
        let stream = |streaming: bool| if streaming { "stream " } else { "" };
        let mut s = format!(
            "rpc {}({}{}) returns ({}{})",
            method.name,
            stream(method.client_streaming),
            self.qualifier.qualify(&method.input_type),
            stream(method.server_streaming),
            self.qualifier.qualify(&method.output_type),
        );
        if method.option_extensions.is_empty() {
            s.push_str(";\n");
            return s;
        }
        s.push_str(" {\n");
        for (name, value) in &method.option_extensions {
            s.push_str(&format!("    option ({name}) = {};\n", quote(value)));
        }
        s.push_str("}\n");
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parser::{Comments, EnumValueDescriptor, ScalarType};
    use pretty_assertions::assert_eq;

    fn field(name: &str, number: u32, ty: FieldType) -> FieldDescriptor {
        FieldDescriptor {
            name: name.into(),
            number,
            cardinality: Cardinality::Singular,
            ty,
            comments: Comments::default(),
        }
    }

    #[test]
    fn renders_nested_message_with_comments() {
        let qualifier = Qualifier::new("pkg");
        let emitter = Emitter {
            qualifier: &qualifier,
        };
        let message = MessageDescriptor {
            name: "Resp".into(),
            full_name: "pkg.Resp".into(),
            messages: vec![MessageDescriptor {
                name: "Inner".into(),
                full_name: "pkg.Resp.Inner".into(),
                fields: vec![field("id", 1, FieldType::Scalar(ScalarType::Int64))],
                comments: Comments {
                    detached: vec![" nested detached".into()],
                    ..Default::default()
                },
                ..Default::default()
            }],
            enums: vec![EnumDescriptor {
                name: "Kind".into(),
                full_name: "pkg.Resp.Kind".into(),
                values: vec![EnumValueDescriptor {
                    name: "A".into(),
                    number: 0,
                    comments: Comments {
                        trailing: " first".into(),
                        ..Default::default()
                    },
                }],
                ..Default::default()
            }],
            fields: vec![
                FieldDescriptor {
                    cardinality: Cardinality::Repeated,
                    ..field("inner", 1, FieldType::Message("pkg.Resp.Inner".into()))
                },
                field(
                    "by_kind",
                    2,
                    FieldType::Map {
                        key: ScalarType::String,
                        value: Box::new(FieldType::Enum("pkg.Resp.Kind".into())),
                    },
                ),
            ],
            ..Default::default()
        };

        let expected = concat!(
            "message Resp {\n",
            "    /*\n",
            "       nested detached\n",
            "      */\n",
            "\n",
            "    message Resp_Inner {\n",
            "        int64 id = 1;\n",
            "    }\n",
            "    enum Resp_Kind {\n",
            "        A = 0; /* first */\n",
            "    }\n",
            "    repeated Resp_Inner inner = 1;\n",
            "    map<string, Resp_Kind> by_kind = 2;\n",
            "}\n",
        );
        assert_eq!(emitter.message_definition(&message), expected);
    }

    #[test]
    fn renders_methods_with_streaming_and_options() {
        let qualifier = Qualifier::new("pkg");
        let emitter = Emitter {
            qualifier: &qualifier,
        };
        let mut options = std::collections::BTreeMap::new();
        options.insert("z.ext".to_string(), "last".to_string());
        options.insert("a.ext".to_string(), "first".to_string());
        let service = ServiceDescriptor {
            name: "S".into(),
            full_name: "pkg.S".into(),
            methods: vec![
                MethodDescriptor {
                    name: "Get".into(),
                    input_type: "pkg.Req".into(),
                    output_type: "pkg.Resp".into(),
                    option_extensions: options,
                    ..Default::default()
                },
                MethodDescriptor {
                    name: "Watch".into(),
                    input_type: "other.Req".into(),
                    output_type: "pkg.Resp".into(),
                    client_streaming: true,
                    server_streaming: true,
                    comments: Comments {
                        leading: " streams".into(),
                        ..Default::default()
                    },
                    ..Default::default()
                },
            ],
            comments: Comments::default(),
        };

        let expected = concat!(
            "service S {\n",
            "    rpc Get(Req) returns (Resp) {\n",
            "        option (a.ext) = \"first\";\n",
            "        option (z.ext) = \"last\";\n",
            "    }\n",
            "\n",
            "    /*\n",
            "       streams\n",
            "      */\n",
            "    rpc Watch(stream other_Req) returns (stream Resp);\n",
            "}\n",
        );
        assert_eq!(emitter.service_definition(&service), expected);
    }

    #[test]
    fn enum_aliases_keep_their_option() {
        let qualifier = Qualifier::new("");
        let emitter = Emitter {
            qualifier: &qualifier,
        };
        let en = EnumDescriptor {
            name: "E".into(),
            full_name: "p.E".into(),
            allow_alias: true,
            values: vec![
                EnumValueDescriptor {
                    name: "A".into(),
                    number: 0,
                    comments: Comments::default(),
                },
                EnumValueDescriptor {
                    name: "B".into(),
                    number: 0,
                    comments: Comments::default(),
                },
            ],
            ..Default::default()
        };
        assert_eq!(
            emitter.enum_definition(&en),
            "enum p_E {\n    option allow_alias = true;\n    A = 0;\n    B = 0;\n}\n"
        );
    }

    #[test]
    fn header_lists_set_file_options_only() {
        let options = FileOptions {
            cc_generic_services: true,
            py_generic_services: true,
            ..Default::default()
        };
        assert_eq!(
            file_options(&options),
            "option cc_generic_services = true;\noption py_generic_services = true;\n"
        );
        assert_eq!(file_options(&FileOptions::default()), "");
    }

    #[test]
    fn option_values_are_requoted() {
        assert_eq!(quote("/orders/{id}"), r#""/orders/{id}""#);
        assert_eq!(quote("say \"hi\""), r#""say \"hi\"""#);
        assert_eq!(quote("a\\b\n\u{1}"), r#""a\\b\n\x01""#);
    }
}
