//! Registry credential resolution for image pulls.

use bollard::auth::DockerCredentials;

use crate::model::{registry_host, RegistryIndex};

/// Look up credentials for `image`'s registry host, if any registry in
/// the environment matches (see `RegistryIndex::lookup` for the
/// two-phase name-then-FQDN search). `bollard::create_image` encodes
/// this into the `X-Registry-Auth` header itself.
pub fn credentials_for(image: &str, registries: &RegistryIndex) -> Option<DockerCredentials> {
    let host = registry_host(image)?;
    let registry = registries.lookup(host)?;

    Some(DockerCredentials {
        username: Some(registry.username.clone()),
        password: Some(registry.password.clone()),
        email: registry.email.clone(),
        serveraddress: Some(registry.url.clone()),
        ..Default::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Registry;
    use std::collections::HashMap;

    #[test]
    fn resolves_credentials_by_registry_host() {
        let mut registries = HashMap::new();
        registries.insert(
            "internal".to_string(),
            Registry {
                url: "registry.example.com".to_string(),
                username: "alice".to_string(),
                password: "secret".to_string(),
                email: None,
            },
        );
        let index = RegistryIndex::new(registries);

        let creds = credentials_for("registry.example.com/team/app:v1", &index).unwrap();
        assert_eq!(creds.username.as_deref(), Some("alice"));
    }

    #[test]
    fn docker_hub_images_without_registry_prefix_have_no_credentials() {
        let index = RegistryIndex::new(HashMap::new());
        assert!(credentials_for("redis:7", &index).is_none());
    }
}
