//! Transform registry and per-class dispatch.
//!
//! Registrations are added once at startup and read-only afterwards, so
//! concurrent dispatch over distinct class units needs no locking. One class
//! unit is processed to completion (all applicable transforms, in
//! registration order) before being handed back; transforms never observe
//! partially-applied state of another transform.

use crate::class::ClassUnit;
use crate::error::Result;

/// What a transform did with the class it was given.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// At least one edit was applied.
    Patched,
    /// None of the transform's expected patterns were present; the class was
    /// left untouched. Expected under version drift, never an error.
    PatternNotFound,
}

/// A transform function: one patch rule over a class unit.
pub type TransformFn = Box<dyn Fn(&mut ClassUnit) -> Result<Outcome> + Send + Sync>;

struct Registration {
    name: String,
    target_class: String,
    /// When set, the transform only runs if the class declares this method
    /// (name, descriptor); its absence counts as `PatternNotFound`.
    target_method: Option<(String, String)>,
    transform: TransformFn,
}

/// Ordered transform registry; the dispatcher of the patch pass.
#[derive(Default)]
pub struct Registry {
    registrations: Vec<Registration>,
}

/// Per-class record of one dispatch pass.
#[derive(Debug, Clone, Default)]
pub struct DispatchReport {
    pub class_name: String,
    /// Names of transforms that patched, in application order.
    pub applied: Vec<String>,
    /// Names of transforms that found none of their patterns.
    pub skipped: Vec<String>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a class-targeted transform.
    pub fn register(
        &mut self,
        name: &str,
        target_class: &str,
        transform: TransformFn,
    ) {
        self.registrations.push(Registration {
            name: name.to_string(),
            target_class: target_class.to_string(),
            target_method: None,
            transform,
        });
    }

    /// Register a transform gated on a specific method of the target class.
    pub fn register_method(
        &mut self,
        name: &str,
        target_class: &str,
        method_name: &str,
        method_descriptor: &str,
        transform: TransformFn,
    ) {
        self.registrations.push(Registration {
            name: name.to_string(),
            target_class: target_class.to_string(),
            target_method: Some((method_name.to_string(), method_descriptor.to_string())),
            transform,
        });
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    /// Apply every registration matching the unit's class name, in
    /// registration order, threading the (possibly already modified) unit
    /// through each. A transform that finds none of its patterns is skipped
    /// with a warning; a hard error aborts this class's pass but reports
    /// which transform failed.
    pub fn dispatch(&self, class: &mut ClassUnit) -> Result<DispatchReport> {
        let mut report = DispatchReport {
            class_name: class.name().to_string(),
            ..DispatchReport::default()
        };
        for reg in &self.registrations {
            if reg.target_class != class.name() {
                continue;
            }
            if let Some((name, descriptor)) = &reg.target_method {
                if class.method(name, descriptor).is_none() {
                    log::warn!(
                        "{}: transform `{}` targets missing method {name}{descriptor}",
                        class.name(),
                        reg.name
                    );
                    report.skipped.push(reg.name.clone());
                    continue;
                }
            }
            match (reg.transform)(class) {
                Ok(Outcome::Patched) => {
                    log::debug!("{}: transform `{}` applied", class.name(), reg.name);
                    report.applied.push(reg.name.clone());
                }
                Ok(Outcome::PatternNotFound) => {
                    log::warn!(
                        "{}: transform `{}` matched none of its patterns",
                        class.name(),
                        reg.name
                    );
                    report.skipped.push(reg.name.clone());
                }
                Err(err) => {
                    log::error!(
                        "{}: transform `{}` failed: {err}",
                        class.name(),
                        reg.name
                    );
                    return Err(err);
                }
            }
        }
        Ok(report)
    }
}
