// ── Command context ──
//
// One per command invocation. Owns the configuration, the lock manager,
// and the executor; orchestrators borrow it and receive everything they
// need explicitly -- there is no ambient global state.

use netforge_config::Config;
use netforge_exec::{CommandOutput, Executor};

use crate::error::CoreError;
use crate::ident;
use crate::lock::LockManager;
use crate::model::StateDocument;
use crate::store::{IspStore, StateStore};

pub struct Context {
    config: Config,
    locks: LockManager,
    executor: Box<dyn Executor>,
}

impl Context {
    pub fn new(config: Config, executor: Box<dyn Executor>) -> Result<Self, CoreError> {
        std::fs::create_dir_all(&config.state_dir).map_err(|source| CoreError::StateWrite {
            path: config.state_dir.display().to_string(),
            source,
        })?;
        let locks = LockManager::new(&config.state_file());
        Ok(Self {
            config,
            locks,
            executor,
        })
    }

    /// Context with a caller-supplied lock manager (tests shrink the lock
    /// poll interval through this).
    pub fn with_locks(
        config: Config,
        locks: LockManager,
        executor: Box<dyn Executor>,
    ) -> Self {
        Self {
            config,
            locks,
            executor,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn state_id(&self) -> &str {
        &self.config.state_id
    }

    pub fn locks(&self) -> &LockManager {
        &self.locks
    }

    pub fn executor(&self) -> &dyn Executor {
        self.executor.as_ref()
    }

    pub fn store(&self) -> StateStore {
        StateStore::new(self.config.state_file())
    }

    pub fn isp_store(&self, isp_id: &str) -> IspStore {
        IspStore::new(self.config.isp_file(isp_id))
    }

    /// The OS name prefix for a long id, allocating its short id on first
    /// use (the allocation lands on disk with the caller's next save).
    pub fn unique_prefix(&self, doc: &mut StateDocument, long_id: &str) -> String {
        ident::unique_prefix(&self.config.state_id, doc, long_id)
    }

    // ── Command lines ────────────────────────────────────────────────

    /// Prefix a command with the configured privilege escalation.
    pub fn as_root(&self, cmd: &str) -> String {
        match self.config.sudo_prefix() {
            Some(prefix) => format!("{prefix} {cmd}"),
            None => cmd.to_owned(),
        }
    }

    /// Undo `as_root` on a command that is about to be re-wrapped (the
    /// namespace wrapper carries its own prefix). `sudo -u` prefixes are
    /// left alone -- those drop privileges rather than raise them.
    fn strip_root<'a>(&self, cmd: &'a str) -> &'a str {
        let Some(prefix) = self.config.sudo_prefix() else {
            return cmd;
        };
        match cmd.strip_prefix(&format!("{prefix} ")) {
            Some(inner) if !inner.starts_with("-u ") => inner,
            _ => cmd,
        }
    }

    /// Run a command on the host, exactly as given.
    pub fn run_host(&self, cmd: &str) -> Result<CommandOutput, CoreError> {
        Ok(self.executor.run(cmd)?)
    }

    /// Run a command inside a node's namespace. Local-type nodes execute
    /// directly on the host.
    pub fn run_at_node(
        &self,
        doc: &mut StateDocument,
        node_id: &str,
        cmd: &str,
    ) -> Result<CommandOutput, CoreError> {
        if doc.is_local_node(node_id) {
            return self.run_host(cmd);
        }
        let prefix = self.unique_prefix(doc, node_id);
        let wrapped = self.as_root(&format!(
            "ip netns exec {prefix} {}",
            self.strip_root(cmd)
        ));
        self.run_host(&wrapped)
    }

    /// Run a command inside a network's namespace (networks live in their
    /// own namespaces, like nodes).
    pub fn run_at_network(
        &self,
        doc: &mut StateDocument,
        network_id: &str,
        cmd: &str,
    ) -> Result<CommandOutput, CoreError> {
        let prefix = self.unique_prefix(doc, network_id);
        let wrapped = self.as_root(&format!(
            "ip netns exec {prefix} {}",
            self.strip_root(cmd)
        ));
        self.run_host(&wrapped)
    }
}
