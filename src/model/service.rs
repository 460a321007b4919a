//! Service entity: a named group of instances sharing an image.

use std::collections::HashMap;

use serde::Deserialize;

use super::instance::{EnvValue, Instance, RawInstance};
use super::lifecycle::{LifecycleChecks, RawLifecycleChecks};

#[derive(Debug, Clone)]
pub struct Service {
    pub name: String,
    pub image: String,
    pub env: HashMap<String, EnvValue>,
    pub lifecycle: LifecycleChecks,
    pub omit: bool,
    pub requires: Vec<String>,
    pub wants_info: Vec<String>,
    pub instances: HashMap<String, Instance>,
}

impl Service {
    pub fn instance_names(&self) -> impl Iterator<Item = &String> {
        self.instances.keys()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawService {
    pub image: String,
    #[serde(default)]
    pub env: HashMap<String, EnvValue>,
    #[serde(default)]
    pub lifecycle: RawLifecycleChecks,
    #[serde(default)]
    pub omit: bool,
    #[serde(default)]
    pub requires: Vec<String>,
    #[serde(default)]
    pub wants_info: Vec<String>,
    #[serde(default)]
    pub instances: HashMap<String, RawInstance>,
}

impl RawService {
    pub fn into_service(self, name: &str) -> Result<Service, String> {
        let mut instances = HashMap::new();
        for (instance_name, raw_instance) in self.instances {
            let instance = raw_instance
                .into_instance(&instance_name, name)
                .map_err(|e| e.to_string())?;
            instances.insert(instance_name, instance);
        }

        Ok(Service {
            name: name.to_string(),
            image: self.image,
            env: self.env,
            lifecycle: self.lifecycle.into_checks(),
            omit: self.omit,
            requires: self.requires,
            wants_info: self.wants_info,
            instances,
        })
    }
}
