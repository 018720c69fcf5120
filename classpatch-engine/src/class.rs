//! Class units: the unit of one patch pass.

use crate::error::{EngineError, Result};
use crate::method::MethodBody;

/// A field declared by a class, available for reference by instructions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    pub name: String,
    pub descriptor: String,
}

impl FieldDef {
    pub fn new(name: &str, descriptor: &str) -> Self {
        Self {
            name: name.to_string(),
            descriptor: descriptor.to_string(),
        }
    }
}

/// One class being patched: an identifying name, its fields, and its
/// methods. Owned exclusively by the dispatcher for the duration of a pass;
/// transforms receive it by mutable reference and may edit or append
/// methods, never replace the identity.
#[derive(Debug, Clone)]
pub struct ClassUnit {
    name: String,
    pub super_name: String,
    fields: Vec<FieldDef>,
    methods: Vec<MethodBody>,
}

impl ClassUnit {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            super_name: "java/lang/Object".to_string(),
            fields: Vec::new(),
            methods: Vec::new(),
        }
    }

    /// Internal name, e.g. `net/minecraft/client/renderer/model/ModelBakery`.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn add_field(&mut self, field: FieldDef) {
        self.fields.push(field);
    }

    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    pub fn field(&self, name: &str, descriptor: &str) -> Option<&FieldDef> {
        self.fields
            .iter()
            .find(|f| f.name == name && f.descriptor == descriptor)
    }

    pub fn methods(&self) -> &[MethodBody] {
        &self.methods
    }

    pub fn method(&self, name: &str, descriptor: &str) -> Option<&MethodBody> {
        self.method_index(name, descriptor).map(|i| &self.methods[i])
    }

    pub fn method_mut(&mut self, name: &str, descriptor: &str) -> Option<&mut MethodBody> {
        self.method_index(name, descriptor)
            .map(|i| &mut self.methods[i])
    }

    pub(crate) fn method_index(&self, name: &str, descriptor: &str) -> Option<usize> {
        self.methods
            .iter()
            .position(|m| m.name() == name && m.descriptor() == descriptor)
    }

    pub(crate) fn method_at(&mut self, index: usize) -> &mut MethodBody {
        &mut self.methods[index]
    }

    /// Append a synthesized method. The (name, descriptor) pair must be
    /// unique within the class, and the body must verify.
    pub fn append_method(&mut self, body: MethodBody) -> Result<()> {
        if self.method_index(body.name(), body.descriptor()).is_some() {
            return Err(EngineError::DuplicateMethod {
                class: self.name.clone(),
                name: body.name().to_string(),
                descriptor: body.descriptor().to_string(),
            });
        }
        body.verify(&self.name)?;
        log::debug!("{}: appended method {}", self.name, body.sig());
        self.methods.push(body);
        Ok(())
    }

    /// Verify every method of the class.
    pub fn verify(&self) -> Result<()> {
        for method in &self.methods {
            method.verify(&self.name)?;
        }
        Ok(())
    }
}
