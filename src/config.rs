use anyhow::{Context, Result};
use std::collections::HashMap;

/// Agent configuration. Every knob has a default so the agent starts with an
/// empty environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub cluster_name: String,
    pub restart_threshold: i32,
    pub top_namespaces: usize,
    pub namespace_concurrency: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cluster_name: "mcp-k8s-cluster".to_string(),
            restart_threshold: 3,
            top_namespaces: 5,
            namespace_concurrency: 4,
        }
    }
}

/// Trait for abstracting environment variable access
pub trait EnvironmentProvider {
    fn get_var(&self, key: &str) -> Option<String>;
}

/// Production implementation using std::env
pub struct SystemEnvironment;

impl EnvironmentProvider for SystemEnvironment {
    fn get_var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// Mock implementation for testing
#[derive(Debug, Default)]
pub struct MockEnvironment {
    vars: HashMap<String, String>,
}

impl MockEnvironment {
    pub fn new() -> Self {
        Self {
            vars: HashMap::new(),
        }
    }

    pub fn set_var<K, V>(&mut self, key: K, value: V) -> &mut Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.vars.insert(key.into(), value.into());
        self
    }

    pub fn with_var<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.set_var(key, value);
        self
    }
}

impl EnvironmentProvider for MockEnvironment {
    fn get_var(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }
}

pub fn load_config() -> Result<Config> {
    load_config_with_env(&SystemEnvironment)
}

pub fn load_config_with_env<E: EnvironmentProvider>(env: &E) -> Result<Config> {
    let defaults = Config::default();

    let cluster_name = env
        .get_var("CLUSTER_NAME")
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(defaults.cluster_name);

    let restart_threshold: i32 = match env.get_var("RESTART_THRESHOLD") {
        Some(v) => v.parse().context("Invalid RESTART_THRESHOLD")?,
        None => defaults.restart_threshold,
    };

    let top_namespaces: usize = match env.get_var("TOP_NAMESPACES") {
        Some(v) => v.parse().context("Invalid TOP_NAMESPACES")?,
        None => defaults.top_namespaces,
    };

    let namespace_concurrency: usize = match env.get_var("NAMESPACE_CONCURRENCY") {
        Some(v) => v
            .parse::<usize>()
            .context("Invalid NAMESPACE_CONCURRENCY")?
            .max(1),
        None => defaults.namespace_concurrency,
    };

    Ok(Config {
        cluster_name,
        restart_threshold,
        top_namespaces,
        namespace_concurrency,
    })
}
