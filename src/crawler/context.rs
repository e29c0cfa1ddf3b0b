use crate::clock::Clock;
use crate::config::Config;
use crate::identity::{Identity, IdentityClient, Transport};
use crate::proxy::{PoolStats, ProxyPool};
use crate::retry::{RecoveryAction, Recover};
use crate::{ConfigError, HarvestError, Result};
use async_trait::async_trait;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Session settings shared by every identity of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    pub base_url: Url,
    pub user_agents: Vec<String>,
    pub accept_language: String,
    pub captcha_marker: String,
    pub rate_limit_pause: Duration,
}

impl SessionSettings {
    pub fn from_config(config: &Config) -> Result<Self> {
        let base_url = Url::parse(&config.target.base_url)
            .map_err(|e| ConfigError::InvalidUrl(format!("{}: {}", config.target.base_url, e)))?;

        Ok(Self {
            base_url,
            user_agents: config.identity.user_agents.clone(),
            accept_language: config.identity.accept_language.clone(),
            captcha_marker: config.target.captcha_marker.clone(),
            rate_limit_pause: Duration::from_secs(config.identity.rate_limit_pause_secs),
        })
    }
}

/// Run-scoped state behind every fetch: the proxy pool and the live identity
///
/// Created once per run. Rotations replace the live identity with a fresh
/// proxy from the pool; a proxy is never handed out twice.
pub struct RunContext {
    pool: ProxyPool,
    client: IdentityClient,
    user_agents: Vec<String>,
    accept_language: String,
    identity_rotations: u64,
    proxy_rotations: u64,
}

impl RunContext {
    /// Fills the pool and binds the first identity
    ///
    /// Proxies whose session cannot be built are skipped. Waits on the pool
    /// while no proxy is available.
    ///
    /// # Errors
    ///
    /// * `HarvestError::Config` - the user-agent list is empty
    /// * `HarvestError::ProxyPoolExhausted` - the pool gave up refilling
    pub async fn establish(
        mut pool: ProxyPool,
        mut transport: Box<dyn Transport>,
        settings: SessionSettings,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        if settings.user_agents.is_empty() {
            return Err(ConfigError::Validation("no user agents configured".to_string()).into());
        }

        if pool.available() == 0 {
            if let Err(failure) = pool.refill().await {
                tracing::warn!("Initial proxy refill failed: {}", failure);
            }
        }

        let user_agent = pick_user_agent(&settings.user_agents, None);
        let identity = loop {
            let proxy = pool.lease().await?;
            let identity = Identity::new(user_agent.clone(), proxy, &settings.accept_language);
            match transport.bind(&identity) {
                Ok(()) => break identity,
                Err(e) => tracing::warn!("Skipping proxy {}: {}", identity.proxy, e),
            }
        };
        tracing::info!(
            "Session established via proxy {} as '{}'",
            identity.proxy,
            identity.user_agent
        );

        let client = IdentityClient::bound(transport, identity, settings.base_url, clock)
            .with_captcha_marker(settings.captcha_marker)
            .with_rate_limit_pause(settings.rate_limit_pause);

        Ok(Self {
            pool,
            client,
            user_agents: settings.user_agents,
            accept_language: settings.accept_language,
            identity_rotations: 0,
            proxy_rotations: 0,
        })
    }

    pub fn client(&self) -> &IdentityClient {
        &self.client
    }

    pub fn client_mut(&mut self) -> &mut IdentityClient {
        &mut self.client
    }

    pub fn identity(&self) -> &Identity {
        self.client.identity()
    }

    pub fn pool(&self) -> &ProxyPool {
        &self.pool
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }

    pub fn identity_rotations(&self) -> u64 {
        self.identity_rotations
    }

    pub fn proxy_rotations(&self) -> u64 {
        self.proxy_rotations
    }

    /// New user agent and new proxy
    pub async fn rotate_identity(&mut self) -> Result<()> {
        let user_agent = pick_user_agent(&self.user_agents, Some(&self.identity().user_agent));
        self.bind_fresh_proxy(user_agent).await?;
        self.identity_rotations += 1;
        Ok(())
    }

    /// Same user agent, new proxy
    pub async fn rotate_proxy(&mut self) -> Result<()> {
        let user_agent = self.identity().user_agent.clone();
        self.bind_fresh_proxy(user_agent).await?;
        self.proxy_rotations += 1;
        Ok(())
    }

    /// Leases proxies until one can be bound with `user_agent`
    async fn bind_fresh_proxy(&mut self, user_agent: String) -> Result<()> {
        loop {
            let proxy = self.pool.lease().await?;
            let identity = Identity::new(user_agent.clone(), proxy, &self.accept_language);
            match self.client.rotate(identity) {
                Ok(()) => return Ok(()),
                Err(failure) => tracing::warn!("Skipping proxy: {}", failure),
            }
        }
    }
}

#[async_trait]
impl Recover for RunContext {
    async fn recover(&mut self, action: RecoveryAction) -> std::result::Result<(), HarvestError> {
        match action {
            RecoveryAction::RotateIdentity => self.rotate_identity().await,
            RecoveryAction::RotateProxy => self.rotate_proxy().await,
            RecoveryAction::Nothing | RecoveryAction::Propagate => Ok(()),
        }
    }
}

/// Picks a random user agent, avoiding `current` when there is a choice
fn pick_user_agent(user_agents: &[String], current: Option<&str>) -> String {
    let candidates: Vec<&String> = user_agents
        .iter()
        .filter(|agent| Some(agent.as_str()) != current)
        .collect();
    let candidates = if candidates.is_empty() {
        user_agents.iter().collect()
    } else {
        candidates
    };

    if candidates.is_empty() {
        return String::new();
    }
    let index = rand::rng().random_range(0..candidates.len());
    candidates[index].clone()
}
