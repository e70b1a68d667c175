use std::collections::{HashMap, HashSet};

use parser::{DescriptorSet, EnumDescriptor, MessageDescriptor};

use crate::MergeError;

/// Identity of a top-level message inside one [`DescriptorIndex`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(usize);

/// Identity of a top-level enum inside one [`DescriptorIndex`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EnumId(usize);

/// Read-only lookup of the top-level messages and enums of every file.
///
/// Nested types are not indexed themselves; they map to the top-level
/// message that declares them, which is where they get emitted.
#[derive(Debug)]
pub struct DescriptorIndex<'a> {
    messages: Vec<&'a MessageDescriptor>,
    enums: Vec<&'a EnumDescriptor>,
    message_ids: HashMap<&'a str, MessageId>,
    enum_ids: HashMap<&'a str, EnumId>,
    nested_messages: HashMap<&'a str, MessageId>,
    nested_enums: HashMap<&'a str, MessageId>,
}

impl<'a> DescriptorIndex<'a> {
    /// Fails when two declarations anywhere in the set share a full name.
    pub fn new(set: &'a DescriptorSet) -> Result<Self, MergeError> {
        let mut index = Self {
            messages: Vec::new(),
            enums: Vec::new(),
            message_ids: HashMap::new(),
            enum_ids: HashMap::new(),
            nested_messages: HashMap::new(),
            nested_enums: HashMap::new(),
        };
        let mut names: HashSet<&'a str> = HashSet::new();

        for file in &set.files {
            for message in &file.messages {
                claim(&mut names, &message.full_name)?;
                let id = MessageId(index.messages.len());
                index.messages.push(message);
                index.message_ids.insert(&message.full_name, id);
                index.register_nested(message, id, &mut names)?;
            }
            for en in &file.enums {
                claim(&mut names, &en.full_name)?;
                let id = EnumId(index.enums.len());
                index.enums.push(en);
                index.enum_ids.insert(&en.full_name, id);
            }
        }

        Ok(index)
    }

    fn register_nested(
        &mut self,
        message: &'a MessageDescriptor,
        owner: MessageId,
        names: &mut HashSet<&'a str>,
    ) -> Result<(), MergeError> {
        for nested in &message.messages {
            claim(names, &nested.full_name)?;
            self.nested_messages.insert(&nested.full_name, owner);
            self.register_nested(nested, owner, names)?;
        }
        for en in &message.enums {
            claim(names, &en.full_name)?;
            self.nested_enums.insert(&en.full_name, owner);
        }
        Ok(())
    }

    pub fn find_message(&self, name: &str) -> Option<MessageId> {
        self.message_ids.get(strip_dot(name)).copied()
    }

    pub fn find_enum(&self, name: &str) -> Option<EnumId> {
        self.enum_ids.get(strip_dot(name)).copied()
    }

    /// Top-level message that declares the nested message `name`.
    pub fn message_owner(&self, name: &str) -> Option<MessageId> {
        self.nested_messages.get(strip_dot(name)).copied()
    }

    /// Top-level message that declares the nested enum `name`.
    pub fn enum_owner(&self, name: &str) -> Option<MessageId> {
        self.nested_enums.get(strip_dot(name)).copied()
    }

    pub fn message(&self, id: MessageId) -> &'a MessageDescriptor {
        self.messages[id.0]
    }

    pub fn enum_descriptor(&self, id: EnumId) -> &'a EnumDescriptor {
        self.enums[id.0]
    }
}

fn claim<'a>(names: &mut HashSet<&'a str>, name: &'a str) -> Result<(), MergeError> {
    if names.insert(name) {
        Ok(())
    } else {
        Err(MergeError::DuplicateDefinition(name.to_string()))
    }
}

fn strip_dot(name: &str) -> &str {
    name.strip_prefix('.').unwrap_or(name)
}
