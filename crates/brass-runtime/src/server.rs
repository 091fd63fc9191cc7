//! Server bootstrap: configuration, logging and the application in one place.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use brass_runtime::Server;
//!
//! let registry = Registry::new();
//! // declare services and controllers on `registry` ...
//!
//! Server::builder()
//!     .registry(registry)
//!     .options(ApplicationOptions::new().controller(Target::of::<UserController>()))
//!     .build()?
//!     .run()
//!     .await?;
//! ```

use std::path::Path;

use brass_framework::{Application, ApplicationOptions, Registry};
use tracing::info;

use crate::config::{BrassConfig, ConfigLoader, validate_config};
use crate::error::RuntimeResult;
use crate::logging;

/// A configured [`Application`] ready to be served.
#[derive(Debug)]
pub struct Server {
    config: BrassConfig,
    app: Application,
}

impl Server {
    /// Creates a server builder that loads configuration from the default locations.
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    /// Validates `config`, initializes logging and builds the application.
    ///
    /// `config.app` overrides the scope and preload settings of `options`.
    pub fn from_config(
        config: BrassConfig,
        registry: Registry,
        options: ApplicationOptions,
    ) -> RuntimeResult<Self> {
        validate_config(&config)?;
        logging::init_from_config(&config.logging);

        let app = Application::new(registry, config.app.apply(options))?;
        info!(
            scope = %app.scope(),
            addr = %config.server.addr(),
            "Server initialized from configuration"
        );
        Ok(Self { config, app })
    }

    pub fn config(&self) -> &BrassConfig {
        &self.config
    }

    /// The application requests are dispatched to.
    pub fn application(&self) -> &Application {
        &self.app
    }

    /// Waits for preloading, then serves until ctrl-c or SIGTERM.
    #[cfg(feature = "http-server")]
    pub async fn run(self) -> RuntimeResult<()> {
        self.run_until(wait_for_shutdown()).await
    }

    /// Waits for preloading, then serves until `shutdown` completes.
    #[cfg(feature = "http-server")]
    pub async fn run_until<F>(self, shutdown: F) -> RuntimeResult<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        self.app.ready().await?;
        info!("Brass server is now running");
        brass_transport::serve_with_shutdown(self.app, &self.config.server.addr(), shutdown).await?;
        Ok(())
    }
}

/// Waits for ctrl-c or, on unix, SIGTERM.
#[cfg(feature = "http-server")]
async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = brass_transport::shutdown_signal() => {}
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to register SIGTERM handler");
                brass_transport::shutdown_signal().await;
            }
        }
    }

    #[cfg(not(unix))]
    brass_transport::shutdown_signal().await;
}

/// Builder for [`Server`].
pub struct ServerBuilder {
    config_loader: ConfigLoader,
    registry: Option<Registry>,
    options: ApplicationOptions,
}

impl ServerBuilder {
    pub fn new() -> Self {
        Self {
            config_loader: ConfigLoader::new(),
            registry: None,
            options: ApplicationOptions::new(),
        }
    }

    /// Sets a specific configuration file to load.
    pub fn config_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path);
        self
    }

    /// Sets the configuration profile (e.g. "development", "production").
    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.config_loader = self.config_loader.profile(profile);
        self
    }

    /// Adds a search path for configuration files.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.search_path(path);
        self
    }

    pub fn with_env(mut self) -> Self {
        self.config_loader = self.config_loader.with_env();
        self
    }

    pub fn without_env(mut self) -> Self {
        self.config_loader = self.config_loader.without_env();
        self
    }

    /// Merges additional configuration programmatically.
    pub fn merge(mut self, config: BrassConfig) -> Self {
        self.config_loader = self.config_loader.merge(config);
        self
    }

    /// The registry holding the declared injectables and controllers.
    /// A fresh registry is used when unset.
    pub fn registry(mut self, registry: Registry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn options(mut self, options: ApplicationOptions) -> Self {
        self.options = options;
        self
    }

    /// Loads the configuration and builds the server.
    pub fn build(self) -> RuntimeResult<Server> {
        let config = self.config_loader.load()?;
        Server::from_config(config, self.registry.unwrap_or_default(), self.options)
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use brass_core::{BoxError, Scope, Target};
    use brass_framework::MethodOptions;
    use bytes::Bytes;
    use http::StatusCode;

    use super::*;
    use crate::config::{AppConfig, ConfigError, ServerConfig};
    use crate::error::RuntimeError;

    struct Ping;

    fn registry() -> Registry {
        let registry = Registry::new();
        registry
            .controllers()
            .declare_controller::<Ping, _>("/ping", [], |_| Ok(Ping))
            .unwrap();
        registry
            .methods()
            .bind::<Ping, _, _, _>("ping", MethodOptions::get("/"), |_, _| async {
                Ok::<_, BoxError>("pong")
            })
            .unwrap();
        registry
    }

    #[tokio::test]
    async fn test_build_applies_app_config() {
        let dir = tempfile::tempdir().unwrap();
        let server = Server::builder()
            .search_path(dir.path())
            .without_env()
            .merge(BrassConfig {
                app: AppConfig {
                    scope: Some("tenant-a".to_string()),
                    preload: true,
                },
                ..Default::default()
            })
            .registry(registry())
            .options(ApplicationOptions::new().controller(Target::of::<Ping>()))
            .build()
            .unwrap();

        assert_eq!(server.application().scope(), &Scope::named("tenant-a"));
        server.application().ready().await.unwrap();

        let request = http::Request::builder()
            .uri("/ping")
            .body(Bytes::new())
            .unwrap();
        let response = server.application().fetch(request, None).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.body().as_ref(), b"\"pong\"");
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = BrassConfig {
            server: ServerConfig {
                port: 0,
                ..Default::default()
            },
            ..Default::default()
        };

        let err = Server::from_config(config, Registry::new(), ApplicationOptions::new()).unwrap_err();
        assert!(matches!(err, RuntimeError::Config(ConfigError::InvalidPort(0))));
    }

    #[test]
    fn test_undeclared_controller_fails_build() {
        let err = Server::from_config(
            BrassConfig::default(),
            Registry::new(),
            ApplicationOptions::new().controller(Target::of::<Ping>()),
        )
        .unwrap_err();
        assert!(matches!(err, RuntimeError::Declaration(_)));
    }
}
