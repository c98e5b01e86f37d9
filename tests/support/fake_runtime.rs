// ABOUTME: In-memory container runtime that records every call.
// ABOUTME: Failures and migration behaviour are injected per test.

use async_trait::async_trait;
use berth::runtime::{
    ContainerConfig, ContainerError, ContainerFilters, ContainerOps, ContainerSummary, ImageError,
    ImageOps, LogError, LogLine, LogLineStream, LogOps, LogOptions, LogStream, LoginGrant,
    NetworkConfig, NetworkError, NetworkOps, PruneFilters, PruneReport, RegistryAuth,
    RegistryError, RegistryOps,
};
use berth::stack::labels;
use berth::types::{ContainerId, ImageRef, NetworkId};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

/// One runtime call, in the order it was made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Login,
    Pull(String),
    ImageExists(String),
    Prune,
    Create(String),
    Start(String),
    Stop(String),
    Remove(String),
    Wait(String),
    List,
    CreateNetwork(String),
    NetworkExists(String),
    Logs(String),
}

#[derive(Debug, Clone)]
pub struct FakeContainer {
    pub id: String,
    pub name: String,
    pub image: String,
    pub labels: HashMap<String, String>,
    pub running: bool,
}

impl FakeContainer {
    pub fn role(&self) -> Option<&str> {
        self.labels.get(labels::ROLE).map(String::as_str)
    }
}

#[derive(Default)]
struct State {
    calls: Vec<Call>,
    containers: BTreeMap<String, FakeContainer>,
    images: HashSet<String>,
    networks: HashSet<String>,
    next_id: u64,
    // injected behaviour
    reject_login: Option<String>,
    fail_pull: Option<String>,
    fail_list: Option<String>,
    fail_start: HashSet<String>,
    fail_remove_prefix: Option<String>,
    fail_prune: Option<String>,
    migration_exit: i64,
    migration_output: String,
    migration_hangs: bool,
    network_hangs: bool,
    pull_delay: Option<Duration>,
    create_delay: Option<Duration>,
}

/// Clones share state, like handles to the same daemon.
#[derive(Clone, Default)]
pub struct FakeRuntime {
    state: Arc<Mutex<State>>,
}

impl FakeRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    // ---- injection -------------------------------------------------------

    pub fn reject_login(self, message: &str) -> Self {
        self.state.lock().reject_login = Some(message.to_string());
        self
    }

    pub fn fail_pull(self, message: &str) -> Self {
        self.state.lock().fail_pull = Some(message.to_string());
        self
    }

    pub fn slow_pull(self, delay: Duration) -> Self {
        self.state.lock().pull_delay = Some(delay);
        self
    }

    pub fn fail_list(self, message: &str) -> Self {
        self.state.lock().fail_list = Some(message.to_string());
        self
    }

    /// Starting the container with this name fails.
    pub fn fail_start(self, name: &str) -> Self {
        self.state.lock().fail_start.insert(name.to_string());
        self
    }

    /// Removing any container whose name starts with `prefix` fails.
    pub fn fail_remove(self, prefix: &str) -> Self {
        self.state.lock().fail_remove_prefix = Some(prefix.to_string());
        self
    }

    pub fn fail_prune(self, message: &str) -> Self {
        self.state.lock().fail_prune = Some(message.to_string());
        self
    }

    pub fn migration_exit(self, code: i64, output: &str) -> Self {
        {
            let mut state = self.state.lock();
            state.migration_exit = code;
            state.migration_output = output.to_string();
        }
        self
    }

    /// The migration container never exits on its own.
    pub fn hang_migration(self) -> Self {
        self.state.lock().migration_hangs = true;
        self
    }

    /// Network lookups never answer.
    pub fn hang_network(self) -> Self {
        self.state.lock().network_hangs = true;
        self
    }

    /// Container creation takes `delay` before the container exists.
    pub fn slow_create(self, delay: Duration) -> Self {
        self.state.lock().create_delay = Some(delay);
        self
    }

    /// Seed a container as if a previous deployment left it behind.
    pub fn with_container(self, name: &str, stack: &str, role: &str, running: bool) -> Self {
        {
            let mut state = self.state.lock();
            let id = state.allocate_id();
            let labels = HashMap::from([
                (labels::MANAGED.to_string(), "true".to_string()),
                (labels::STACK.to_string(), stack.to_string()),
                (labels::ROLE.to_string(), role.to_string()),
            ]);
            state.containers.insert(
                id.clone(),
                FakeContainer {
                    id,
                    name: name.to_string(),
                    image: "ghcr.io/acme/old:0.9.0".to_string(),
                    labels,
                    running,
                },
            );
        }
        self
    }

    // ---- inspection ------------------------------------------------------

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    pub fn count(&self, matches: impl Fn(&Call) -> bool) -> usize {
        self.state.lock().calls.iter().filter(|c| matches(c)).count()
    }

    /// Index of the first call matching, if any.
    pub fn position(&self, matches: impl Fn(&Call) -> bool) -> Option<usize> {
        self.state.lock().calls.iter().position(matches)
    }

    pub fn containers(&self) -> Vec<FakeContainer> {
        self.state.lock().containers.values().cloned().collect()
    }

    pub fn container_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.containers().into_iter().map(|c| c.name).collect();
        names.sort();
        names
    }

    pub fn migration_containers(&self) -> Vec<FakeContainer> {
        self.containers()
            .into_iter()
            .filter(|c| c.role() == Some(labels::ROLE_MIGRATION))
            .collect()
    }

    fn record(&self, call: Call) {
        self.state.lock().calls.push(call);
    }

    fn name_of(&self, id: &ContainerId) -> String {
        self.state
            .lock()
            .containers
            .get(id.as_str())
            .map(|c| c.name.clone())
            .unwrap_or_else(|| id.to_string())
    }
}

impl State {
    fn allocate_id(&mut self) -> String {
        self.next_id += 1;
        format!("{:064x}", self.next_id)
    }
}

#[async_trait]
impl RegistryOps for FakeRuntime {
    async fn login(&self, _auth: &RegistryAuth) -> Result<LoginGrant, RegistryError> {
        self.record(Call::Login);
        match self.state.lock().reject_login.clone() {
            Some(message) => Err(RegistryError::Rejected(message)),
            None => Ok(LoginGrant {
                status: "Login Succeeded".to_string(),
                identity_token: None,
            }),
        }
    }
}

#[async_trait]
impl ImageOps for FakeRuntime {
    async fn pull_image(
        &self,
        reference: &ImageRef,
        _auth: Option<&RegistryAuth>,
    ) -> Result<(), ImageError> {
        self.record(Call::Pull(reference.to_string()));
        let delay = self.state.lock().pull_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let mut state = self.state.lock();
        if let Some(message) = &state.fail_pull {
            return Err(ImageError::PullFailed(message.clone()));
        }
        state.images.insert(reference.to_string());
        Ok(())
    }

    async fn image_exists(&self, reference: &ImageRef) -> Result<bool, ImageError> {
        self.record(Call::ImageExists(reference.to_string()));
        Ok(self.state.lock().images.contains(&reference.to_string()))
    }

    async fn prune_images(&self, _filters: &PruneFilters) -> Result<PruneReport, ImageError> {
        self.record(Call::Prune);
        match self.state.lock().fail_prune.clone() {
            Some(message) => Err(ImageError::PruneFailed(message)),
            None => Ok(PruneReport {
                images_deleted: vec!["sha256:0ld".to_string()],
                space_reclaimed: 1024,
            }),
        }
    }
}

#[async_trait]
impl ContainerOps for FakeRuntime {
    async fn create_container(
        &self,
        config: &ContainerConfig,
    ) -> Result<ContainerId, ContainerError> {
        self.record(Call::Create(config.name.clone()));
        let delay = self.state.lock().create_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let mut state = self.state.lock();
        if state.containers.values().any(|c| c.name == config.name) {
            return Err(ContainerError::AlreadyExists(config.name.clone()));
        }
        let id = state.allocate_id();
        state.containers.insert(
            id.clone(),
            FakeContainer {
                id: id.clone(),
                name: config.name.clone(),
                image: config.image.to_string(),
                labels: config.labels.clone(),
                running: false,
            },
        );
        Ok(ContainerId::new(id))
    }

    async fn start_container(&self, id: &ContainerId) -> Result<(), ContainerError> {
        let name = self.name_of(id);
        self.record(Call::Start(name.clone()));
        let mut state = self.state.lock();
        if state.fail_start.contains(&name) {
            return Err(ContainerError::Runtime(format!("cannot start {name}")));
        }
        match state.containers.get_mut(id.as_str()) {
            Some(container) if container.running => Err(ContainerError::AlreadyRunning(name)),
            Some(container) => {
                container.running = true;
                Ok(())
            }
            None => Err(ContainerError::NotFound(name)),
        }
    }

    async fn stop_container(
        &self,
        id: &ContainerId,
        _timeout: Duration,
    ) -> Result<(), ContainerError> {
        let name = self.name_of(id);
        self.record(Call::Stop(name.clone()));
        match self.state.lock().containers.get_mut(id.as_str()) {
            Some(container) if !container.running => Err(ContainerError::NotRunning(name)),
            Some(container) => {
                container.running = false;
                Ok(())
            }
            None => Err(ContainerError::NotFound(name)),
        }
    }

    async fn remove_container(&self, id: &ContainerId, _force: bool) -> Result<(), ContainerError> {
        let name = self.name_of(id);
        self.record(Call::Remove(name.clone()));
        let mut state = self.state.lock();
        if let Some(prefix) = &state.fail_remove_prefix
            && name.starts_with(prefix.as_str())
        {
            return Err(ContainerError::Runtime(format!("device busy: {name}")));
        }
        match state.containers.remove(id.as_str()) {
            Some(_) => Ok(()),
            None => Err(ContainerError::NotFound(name)),
        }
    }

    async fn wait_container(&self, id: &ContainerId) -> Result<i64, ContainerError> {
        let name = self.name_of(id);
        self.record(Call::Wait(name.clone()));
        let (is_migration, hangs, exit) = {
            let state = self.state.lock();
            let container = state
                .containers
                .get(id.as_str())
                .ok_or_else(|| ContainerError::NotFound(name.clone()))?;
            (
                container.role() == Some(labels::ROLE_MIGRATION),
                state.migration_hangs,
                state.migration_exit,
            )
        };

        if is_migration && hangs {
            std::future::pending::<()>().await;
        }

        if let Some(container) = self.state.lock().containers.get_mut(id.as_str()) {
            container.running = false;
        }
        Ok(if is_migration { exit } else { 0 })
    }

    async fn list_containers(
        &self,
        filters: &ContainerFilters,
    ) -> Result<Vec<ContainerSummary>, ContainerError> {
        self.record(Call::List);
        let state = self.state.lock();
        if let Some(message) = &state.fail_list {
            return Err(ContainerError::Runtime(message.clone()));
        }
        Ok(state
            .containers
            .values()
            .filter(|c| filters.all || c.running)
            .filter(|c| {
                filters
                    .labels
                    .iter()
                    .all(|(k, v)| c.labels.get(k) == Some(v))
            })
            .map(|c| ContainerSummary {
                id: ContainerId::new(c.id.clone()),
                name: c.name.clone(),
                image: c.image.clone(),
                state: if c.running { "running" } else { "exited" }.to_string(),
                status: String::new(),
                labels: c.labels.clone(),
            })
            .collect())
    }
}

#[async_trait]
impl NetworkOps for FakeRuntime {
    async fn create_network(&self, config: &NetworkConfig) -> Result<NetworkId, NetworkError> {
        self.record(Call::CreateNetwork(config.name.clone()));
        if !self.state.lock().networks.insert(config.name.clone()) {
            return Err(NetworkError::AlreadyExists(config.name.clone()));
        }
        Ok(NetworkId::new(config.name.clone()))
    }

    async fn network_exists(&self, name: &str) -> Result<bool, NetworkError> {
        self.record(Call::NetworkExists(name.to_string()));
        let hangs = self.state.lock().network_hangs;
        if hangs {
            std::future::pending::<()>().await;
        }
        Ok(self.state.lock().networks.contains(name))
    }
}

#[async_trait]
impl LogOps for FakeRuntime {
    async fn container_logs(
        &self,
        id: &ContainerId,
        _opts: &LogOptions,
    ) -> Result<LogLineStream, LogError> {
        self.record(Call::Logs(self.name_of(id)));
        let output = self.state.lock().migration_output.clone();
        let lines: Vec<Result<LogLine, LogError>> = output
            .split_inclusive('\n')
            .map(|line| {
                Ok(LogLine {
                    content: line.to_string(),
                    stream: LogStream::Stdout,
                })
            })
            .collect();
        Ok(Box::pin(futures::stream::iter(lines)))
    }
}
