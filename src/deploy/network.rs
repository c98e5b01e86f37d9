// ABOUTME: Stack network preparation shared by migration and startup.
// ABOUTME: Creates the bridge network on first deploy and tolerates creation races.

use std::collections::HashMap;

use crate::runtime::{NetworkConfig, NetworkError, NetworkOps};
use crate::stack::{StackDefinition, labels};
use crate::types::NetworkId;

/// Ensure the stack's network exists, creating it if necessary.
pub(crate) async fn ensure_network<R: NetworkOps + ?Sized>(
    runtime: &R,
    stack: &StackDefinition,
) -> Result<NetworkId, NetworkError> {
    let network_name = stack.network_name();

    if runtime.network_exists(network_name).await? {
        return Ok(NetworkId::new(network_name));
    }

    let config = NetworkConfig {
        name: network_name.to_string(),
        driver: Some("bridge".to_string()),
        labels: HashMap::from([
            (labels::MANAGED.to_string(), "true".to_string()),
            (labels::STACK.to_string(), stack.name.to_string()),
        ]),
    };

    tracing::debug!("creating network {}", network_name);
    match runtime.create_network(&config).await {
        Ok(_) | Err(NetworkError::AlreadyExists(_)) => Ok(NetworkId::new(network_name)),
        Err(e) => Err(e),
    }
}
