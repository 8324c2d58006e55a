//! Script host port trait.

use std::path::Path;

use crate::domain::value::Value;

/// A loaded script, called once per evaluation of its parameters.
pub trait Script {
    fn call(&mut self, parameters: &[Value]) -> Result<Value, String>;
}

pub trait ScriptHost {
    fn load(&self, path: &Path) -> Result<Box<dyn Script>, String>;
}
