use std::collections::VecDeque;

use indexmap::IndexSet;
use parser::{FieldDescriptor, FieldType, FileDescriptor, MessageDescriptor};
use tracing::debug;

use crate::{DescriptorIndex, EnumId, MergeError, MergeOptions, MessageId};

/// Top-level types to emit, in the order they were first reached.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Closure {
    pub messages: IndexSet<MessageId>,
    pub enums: IndexSet<EnumId>,
}

/// Where a referenced enum lives: on its own or inside a message.
enum EnumTarget {
    Enum(EnumId),
    Owner(MessageId),
}

struct Resolver<'i, 'a> {
    index: &'i DescriptorIndex<'a>,
    closure: Closure,
    worklist: VecDeque<MessageId>,
}

/// Collect every type reachable from the root file.
///
/// Seeds, in order: the root file's enums and messages, the input and output
/// of every root service method, then the configured additional messages and
/// enums. Every message in the set has its fields (including those of its
/// nested messages) followed until nothing new is found.
pub fn resolve(
    index: &DescriptorIndex<'_>,
    root: &FileDescriptor,
    options: &MergeOptions,
) -> Result<Closure, MergeError> {
    let mut resolver = Resolver {
        index,
        closure: Closure::default(),
        worklist: VecDeque::new(),
    };

    for en in &root.enums {
        match resolver.lookup_enum(&en.full_name) {
            Some(target) => resolver.add_enum_target(target),
            None => return Err(unresolved(&en.full_name, &root.name)),
        }
    }
    for message in &root.messages {
        let id = resolver
            .lookup_message(&message.full_name)
            .ok_or_else(|| unresolved(&message.full_name, &root.name))?;
        resolver.add_message(id);
    }

    for service in &root.services {
        for method in &service.methods {
            for ty in [&method.input_type, &method.output_type] {
                let id = resolver.lookup_message(ty).ok_or_else(|| {
                    unresolved(ty, &format!("{}.{}", service.name, method.name))
                })?;
                resolver.add_message(id);
            }
        }
    }

    for name in &options.additional_message {
        let id = resolver
            .lookup_message(name)
            .ok_or_else(|| MergeError::MissingMessage(name.clone()))?;
        debug!(type_name = %name, "additional message");
        resolver.add_message(id);
    }
    for name in &options.additional_enum {
        let target = resolver
            .lookup_enum(name)
            .ok_or_else(|| MergeError::MissingEnum(name.clone()))?;
        debug!(type_name = %name, "additional enum");
        resolver.add_enum_target(target);
    }

    resolver.expand()?;
    Ok(resolver.closure)
}

impl<'a> Resolver<'_, 'a> {
    fn expand(&mut self) -> Result<(), MergeError> {
        while let Some(id) = self.worklist.pop_front() {
            let message = self.index.message(id);
            self.visit(message)?;
        }
        Ok(())
    }

    // Recurses over lexical nesting only; the type graph is walked by the worklist.
    fn visit(&mut self, message: &'a MessageDescriptor) -> Result<(), MergeError> {
        for field in &message.fields {
            self.follow(&field.ty, message, field)?;
        }
        for nested in &message.messages {
            self.visit(nested)?;
        }
        Ok(())
    }

    fn follow(
        &mut self,
        ty: &FieldType,
        message: &MessageDescriptor,
        field: &FieldDescriptor,
    ) -> Result<(), MergeError> {
        let referrer = || format!("{}.{}", message.full_name, field.name);
        match ty {
            FieldType::Scalar(_) => Ok(()),
            FieldType::Message(name) => {
                let id = self
                    .lookup_message(name)
                    .ok_or_else(|| unresolved(name, &referrer()))?;
                self.add_message(id);
                Ok(())
            }
            FieldType::Enum(name) => {
                let target = self
                    .lookup_enum(name)
                    .ok_or_else(|| unresolved(name, &referrer()))?;
                self.add_enum_target(target);
                Ok(())
            }
            FieldType::Map { value, .. } => self.follow(value, message, field),
            FieldType::Named(name) => Err(unresolved(name, &referrer())),
        }
    }

    fn lookup_message(&self, name: &str) -> Option<MessageId> {
        self.index
            .find_message(name)
            .or_else(|| self.index.message_owner(name))
    }

    fn lookup_enum(&self, name: &str) -> Option<EnumTarget> {
        match self.index.find_enum(name) {
            Some(id) => Some(EnumTarget::Enum(id)),
            None => self.index.enum_owner(name).map(EnumTarget::Owner),
        }
    }

    fn add_message(&mut self, id: MessageId) {
        if self.closure.messages.insert(id) {
            debug!(type_name = %self.index.message(id).full_name, "added to closure");
            self.worklist.push_back(id);
        }
    }

    fn add_enum_target(&mut self, target: EnumTarget) {
        match target {
            EnumTarget::Enum(id) => {
                if self.closure.enums.insert(id) {
                    debug!(type_name = %self.index.enum_descriptor(id).full_name, "added to closure");
                }
            }
            EnumTarget::Owner(id) => self.add_message(id),
        }
    }
}

fn unresolved(type_name: &str, referenced_by: &str) -> MergeError {
    MergeError::UnresolvedReference {
        type_name: type_name.strip_prefix('.').unwrap_or(type_name).to_string(),
        referenced_by: referenced_by.to_string(),
    }
}
