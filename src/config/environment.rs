//! Process property source.
//!
//! Properties such as `cc.home` or `server.config.path` are looked up in this order:
//! explicit properties set on the [`Environment`], the OS environment variable with
//! the exact name, then the upper-cased variable with `.` and `-` mapped to `_`
//! (`cc.home` → `CC_HOME`).

use std::collections::BTreeMap;
use std::env;

#[derive(Debug, Clone)]
pub struct Environment {
    properties: BTreeMap<String, String>,
    process: bool,
}

impl Environment {
    /// Explicit properties backed by the live process environment.
    pub fn from_process() -> Self {
        Self {
            properties: BTreeMap::new(),
            process: true,
        }
    }

    /// Only explicit properties; the OS environment is never consulted.
    pub fn empty() -> Self {
        Self {
            properties: BTreeMap::new(),
            process: false,
        }
    }

    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.properties.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<String> {
        if let Some(value) = self.properties.get(name) {
            return Some(value.clone());
        }
        if !self.process {
            return None;
        }
        env::var(name)
            .ok()
            .or_else(|| env::var(Self::env_var_name(name)).ok())
    }

    /// Name of the OS variable consulted as a fallback for a dotted property.
    pub fn env_var_name(name: &str) -> String {
        name.chars()
            .map(|c| match c {
                '.' | '-' => '_',
                c => c.to_ascii_uppercase(),
            })
            .collect()
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::from_process()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_var_name() {
        assert_eq!(Environment::env_var_name("cc.home"), "CC_HOME");
        assert_eq!(
            Environment::env_var_name("spring.cloud.bootstrap-location"),
            "SPRING_CLOUD_BOOTSTRAP_LOCATION"
        );
    }

    #[test]
    fn test_explicit_properties_only() {
        let env = Environment::empty().with_property("cc.home", "/opt/cc");
        assert_eq!(env.get("cc.home").as_deref(), Some("/opt/cc"));
        assert_eq!(env.get("PATH"), None);
    }
}
