// ABOUTME: Integration tests for type-safe identifiers and validated types.
// ABOUTME: Tests parsing, validation, and redaction properties.

use berth::types::*;
use proptest::prelude::*;

mod image_ref_tests {
    use super::*;

    #[test]
    fn parse_simple_name() {
        let img = ImageRef::parse("nginx").unwrap();
        assert_eq!(img.name(), "nginx");
        assert_eq!(img.tag(), Some("latest"));
        assert!(img.registry().is_none());
        assert!(img.digest().is_none());
        assert_eq!(img.registry_host(), DEFAULT_REGISTRY);
    }

    #[test]
    fn parse_with_registry_and_org() {
        let img = ImageRef::parse("ghcr.io/acme/shop-web:1.4.0").unwrap();
        assert_eq!(img.registry(), Some("ghcr.io"));
        assert_eq!(img.name(), "acme/shop-web");
        assert_eq!(img.tag(), Some("1.4.0"));
        assert_eq!(img.to_string(), "ghcr.io/acme/shop-web:1.4.0");
    }

    #[test]
    fn parse_with_digest_has_no_implied_tag() {
        let img = ImageRef::parse("registry.local:5000/app@sha256:abc123").unwrap();
        assert_eq!(img.registry(), Some("registry.local:5000"));
        assert_eq!(img.tag(), None);
        assert_eq!(img.digest(), Some("sha256:abc123"));
    }

    #[test]
    fn docker_hub_aliases_match() {
        let img = ImageRef::parse("library/redis:7").unwrap();
        assert!(img.is_hosted_on("docker.io"));
        assert!(img.is_hosted_on("https://index.docker.io/v1/"));
        assert!(!img.is_hosted_on("ghcr.io"));
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(ImageRef::parse("  "), Err(ParseImageRefError::Empty)));
        assert!(matches!(
            ImageRef::parse("nginx latest"),
            Err(ParseImageRefError::InvalidChar(' '))
        ));
        assert!(ImageRef::parse("nginx:").is_err());
    }
}

mod name_tests {
    use super::*;

    #[test]
    fn valid_names() {
        assert_eq!(StackName::new("shop").unwrap().as_str(), "shop");
        assert_eq!(ServiceName::new("svc-0").unwrap().as_str(), "svc-0");
    }

    #[test]
    fn invalid_names() {
        assert_eq!(StackName::new(""), Err(NameError::Empty("stack")));
        assert_eq!(ServiceName::new("Web"), Err(NameError::NotLowercase("service")));
        assert_eq!(ServiceName::new("-web"), Err(NameError::BadEdge("service")));
        assert_eq!(
            StackName::new("shop_app"),
            Err(NameError::InvalidChar("stack", '_'))
        );
        assert_eq!(
            StackName::new(&"a".repeat(64)),
            Err(NameError::TooLong("stack"))
        );
    }

    #[test]
    fn service_names_are_valid_aliases() {
        let service = ServiceName::new("api-v2").unwrap();
        assert_eq!(service.as_alias().as_str(), "api-v2");
        assert!(NetworkAlias::new("api.internal").is_ok());
        assert!(NetworkAlias::new("api internal").is_err());
    }

    proptest! {
        #[test]
        fn accepted_names_are_dns_labels(name in "[a-z0-9-]{1,70}") {
            if let Ok(stack) = StackName::new(&name) {
                prop_assert!(stack.as_str().len() <= 63);
                prop_assert!(!stack.as_str().starts_with('-'));
                prop_assert!(!stack.as_str().ends_with('-'));
            }
        }
    }
}

mod id_tests {
    use super::*;

    #[test]
    fn short_form_for_display() {
        let id = ContainerId::new("0123456789abcdef0123456789abcdef");
        assert_eq!(id.short(), "0123456789ab");
        assert_eq!(id.as_str().len(), 32);
    }
}

mod secret_tests {
    use super::*;

    #[test]
    fn secret_never_shows_in_debug() {
        let secret = Secret::new("hunter2");
        assert!(!format!("{secret:?}").contains("hunter2"));
        assert_eq!(secret.expose(), "hunter2");
    }

    #[test]
    fn scrub_masks_every_occurrence() {
        let secret = Secret::new("hunter2");
        assert_eq!(
            secret.scrub("login hunter2 failed (hunter2)"),
            "login *** failed (***)"
        );
    }
}
