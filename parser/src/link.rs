// Resolves type references written in .proto source to full names.
//
// Lookup follows protobuf scoping: a relative name is tried in the
// innermost scope first and then in each enclosing scope up to the root;
// a leading dot makes the name absolute.

use std::collections::HashMap;

use crate::{DescriptorSet, FieldType, FileDescriptor, MessageDescriptor, ParseError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SymbolKind {
    Message,
    Enum,
}

struct Symbols(HashMap<String, SymbolKind>);

impl DescriptorSet {
    /// Builds a set from parsed files, resolving every field and method type.
    pub fn link(mut files: Vec<FileDescriptor>) -> Result<Self, ParseError> {
        let mut symbols = HashMap::new();
        for file in &files {
            for message in &file.messages {
                collect_message(message, &mut symbols);
            }
            for en in &file.enums {
                symbols.insert(en.full_name.clone(), SymbolKind::Enum);
            }
        }
        let symbols = Symbols(symbols);

        for file in &mut files {
            for message in &mut file.messages {
                symbols.link_message(message)?;
            }
            let scope = file.package.clone().unwrap_or_default();
            for service in &mut file.services {
                for method in &mut service.methods {
                    let owner = format!("{}.{}", service.full_name, method.name);
                    method.input_type = symbols.resolve(&scope, &method.input_type, &owner)?.0;
                    method.output_type = symbols.resolve(&scope, &method.output_type, &owner)?.0;
                }
            }
        }

        Ok(DescriptorSet { files })
    }
}

fn collect_message(message: &MessageDescriptor, symbols: &mut HashMap<String, SymbolKind>) {
    symbols.insert(message.full_name.clone(), SymbolKind::Message);
    for nested in &message.messages {
        collect_message(nested, symbols);
    }
    for en in &message.enums {
        symbols.insert(en.full_name.clone(), SymbolKind::Enum);
    }
}

impl Symbols {
    fn link_message(&self, message: &mut MessageDescriptor) -> Result<(), ParseError> {
        for field in &mut message.fields {
            let owner = format!("{}.{}", message.full_name, field.name);
            self.link_type(&message.full_name, &mut field.ty, &owner)?;
        }
        for nested in &mut message.messages {
            self.link_message(nested)?;
        }
        Ok(())
    }

    fn link_type(&self, scope: &str, ty: &mut FieldType, owner: &str) -> Result<(), ParseError> {
        match ty {
            FieldType::Named(name) => {
                let (full_name, kind) = self.resolve(scope, name, owner)?;
                *ty = match kind {
                    SymbolKind::Message => FieldType::Message(full_name),
                    SymbolKind::Enum => FieldType::Enum(full_name),
                };
                Ok(())
            }
            FieldType::Map { value, .. } => self.link_type(scope, value, owner),
            FieldType::Scalar(_) | FieldType::Message(_) | FieldType::Enum(_) => Ok(()),
        }
    }

    fn resolve(
        &self,
        scope: &str,
        name: &str,
        owner: &str,
    ) -> Result<(String, SymbolKind), ParseError> {
        self.lookup(scope, name)
            .ok_or_else(|| ParseError::UnresolvedType {
                type_name: name.to_string(),
                scope: owner.to_string(),
            })
    }

    fn lookup(&self, scope: &str, name: &str) -> Option<(String, SymbolKind)> {
        if let Some(absolute) = name.strip_prefix('.') {
            return self.0.get(absolute).map(|kind| (absolute.to_string(), *kind));
        }
        let mut scope = scope;
        loop {
            let candidate = if scope.is_empty() {
                name.to_string()
            } else {
                format!("{scope}.{name}")
            };
            if let Some(kind) = self.0.get(&candidate) {
                return Some((candidate, *kind));
            }
            if scope.is_empty() {
                return None;
            }
            scope = scope.rfind('.').map_or("", |i| &scope[..i]);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{DescriptorSet, FieldType, ParseError, ScalarType, parse_proto_str};
    use pretty_assertions::assert_eq;

    fn link(sources: &[(&str, &str)]) -> Result<DescriptorSet, ParseError> {
        let files = sources
            .iter()
            .map(|(name, src)| parse_proto_str(name, src))
            .collect::<Result<Vec<_>, _>>()?;
        DescriptorSet::link(files)
    }

    #[test]
    fn resolves_nested_sibling_and_cross_file_types() {
        let set = link(&[
            (
                "a.proto",
                r#"
                syntax = "proto3";
                package pkg;
                message Outer {
                    message Inner { Kind kind = 1; }
                    enum Kind { K = 0; }
                    Inner inner = 1;
                    other.Shared shared = 2;
                    map<int32, Inner> by_id = 3;
                }
                service S { rpc M(Outer) returns (.other.Shared); }
                "#,
            ),
            (
                "b.proto",
                r#"
                syntax = "proto3";
                package other;
                message Shared {}
                "#,
            ),
        ])
        .expect("link failed");

        let outer = &set.files[0].messages[0];
        assert_eq!(outer.fields[0].ty, FieldType::Message("pkg.Outer.Inner".into()));
        assert_eq!(outer.fields[1].ty, FieldType::Message("other.Shared".into()));
        assert_eq!(
            outer.fields[2].ty,
            FieldType::Map {
                key: ScalarType::Int32,
                value: Box::new(FieldType::Message("pkg.Outer.Inner".into())),
            }
        );
        let inner = &outer.messages[0];
        assert_eq!(inner.fields[0].ty, FieldType::Enum("pkg.Outer.Kind".into()));

        let method = &set.files[0].services[0].methods[0];
        assert_eq!(method.input_type, "pkg.Outer");
        assert_eq!(method.output_type, "other.Shared");
    }

    #[test]
    fn unknown_type_names_the_field() {
        let err = link(&[(
            "a.proto",
            "syntax = \"proto3\";\npackage pkg;\nmessage M { Missing m = 1; }\n",
        )])
        .unwrap_err();
        match err {
            ParseError::UnresolvedType { type_name, scope } => {
                assert_eq!(type_name, "Missing");
                assert_eq!(scope, "pkg.M.m");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
