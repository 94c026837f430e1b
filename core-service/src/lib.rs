//! Core service façade and bootstrap helpers.
//!
//! This crate wires host-provided bridge implementations (HTTP, filesystem,
//! secure storage, album service) into the uploader core and exposes the
//! trigger operations: start and complete authorization, run a bulk upload.
//! Desktop hosts enable the `desktop-shims` feature, which builds the bridges
//! from `bridge-desktop` and the Google Photos connector.

pub mod error;

pub use error::{CoreError, Result};

use std::sync::Arc;

use bridge_traits::{
    album::AlbumService,
    http::HttpClient,
    storage::{FileSystemAccess, SecureStore},
};
use core_auth::{
    AuthState, CredentialStore, CredentialSummary, IdentityExchange, OAuthConfig,
    OAuthFlowManager, PkceVerifier, TokenLifecycleManager, DEFAULT_EXCHANGE_TIMEOUT,
};
use core_runtime::config::UploaderConfig;
use core_runtime::events::{AuthEvent, CoreEvent, EventBus};
use core_upload::{MediaDiscovery, UploadConfig, UploadOrchestrator, UploadResult};
use tokio::sync::Mutex;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

/// Aggregated handle to all bridge dependencies the core requires.
pub struct UploaderDependencies {
    pub http_client: Arc<dyn HttpClient>,
    pub filesystem: Arc<dyn FileSystemAccess>,
    pub secure_store: Arc<dyn SecureStore>,
    pub album_service: Arc<dyn AlbumService>,
}

impl UploaderDependencies {
    /// Construct a dependency bundle from explicit bridge handles.
    pub fn new(
        http_client: Arc<dyn HttpClient>,
        filesystem: Arc<dyn FileSystemAccess>,
        secure_store: Arc<dyn SecureStore>,
        album_service: Arc<dyn AlbumService>,
    ) -> Self {
        Self {
            http_client,
            filesystem,
            secure_store,
            album_service,
        }
    }
}

/// Primary façade exposed to host applications.
pub struct UploaderService {
    config: UploaderConfig,
    event_bus: EventBus,
    oauth: Arc<OAuthFlowManager>,
    manager: Arc<TokenLifecycleManager>,
    discovery: MediaDiscovery,
    orchestrator: UploadOrchestrator,
    /// Verifier of the consent URL handed out last
    pending_verifier: Mutex<Option<PkceVerifier>>,
    run_lock: Mutex<()>,
}

impl UploaderService {
    /// Validate the configuration and assemble the pipeline.
    pub fn new(config: UploaderConfig, deps: UploaderDependencies) -> Result<Self> {
        config.validate()?;

        let event_bus = EventBus::default();

        let oauth_config = OAuthConfig::google_photos(
            config.oauth.client_id.clone(),
            Some(config.oauth.client_secret.clone()),
            config.oauth.redirect_url.clone(),
        );
        let oauth = Arc::new(OAuthFlowManager::new(oauth_config, deps.http_client));
        let exchange: Arc<dyn IdentityExchange> = oauth.clone();

        let manager = Arc::new(TokenLifecycleManager::new(
            CredentialStore::new(deps.secure_store),
            exchange,
            event_bus.clone(),
            oauth.provider(),
        ));

        let upload_config = UploadConfig::from(&config);
        let discovery = MediaDiscovery::new(deps.filesystem.clone())
            .with_extensions(&upload_config.media_extensions);
        let orchestrator = UploadOrchestrator::new(
            deps.album_service,
            manager.clone(),
            deps.filesystem,
            upload_config,
            event_bus.clone(),
        );

        Ok(Self {
            config,
            event_bus,
            oauth,
            manager,
            discovery,
            orchestrator,
            pending_verifier: Mutex::new(None),
            run_lock: Mutex::new(()),
        })
    }

    pub fn config(&self) -> &UploaderConfig {
        &self.config
    }

    /// Bus carrying auth and upload events; subscribe before triggering work.
    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Consent URL for the user to visit. Its PKCE verifier is kept until
    /// [`complete_authorization`](Self::complete_authorization).
    #[instrument(skip(self))]
    pub async fn start_authorization(&self) -> Result<String> {
        let (url, verifier) = self.oauth.build_auth_url()?;
        *self.pending_verifier.lock().await = Some(verifier);

        let _ = self.event_bus.emit(CoreEvent::Auth(AuthEvent::SigningIn {
            provider: self.oauth.provider().to_string(),
        }));

        info!("Authorization URL issued");
        Ok(url)
    }

    /// Exchange the authorization code and install the resulting session.
    #[instrument(skip(self, code))]
    pub async fn complete_authorization(&self, code: &str) -> Result<CredentialSummary> {
        let verifier = self.pending_verifier.lock().await.take();
        if verifier.is_none() {
            warn!("No pending authorization URL, exchanging code without PKCE verifier");
        }

        let tokens = timeout(
            DEFAULT_EXCHANGE_TIMEOUT,
            self.oauth.exchange_code(code, verifier.as_ref()),
        )
        .await
        .map_err(|_| core_auth::AuthError::OperationTimeout {
            operation: "authorization code exchange".to_string(),
            timeout_secs: DEFAULT_EXCHANGE_TIMEOUT.as_secs(),
        })??;

        Ok(self.manager.complete_authorization(tokens).await?)
    }

    /// Restore the session from the stored credential, if any.
    pub async fn bootstrap(&self) -> Result<bool> {
        Ok(self.manager.bootstrap().await?)
    }

    pub async fn auth_state(&self) -> AuthState {
        self.manager.state().await
    }

    pub async fn logout(&self) -> Result<()> {
        Ok(self.manager.logout().await?)
    }

    /// Upload every top-level folder of the media root into a new album.
    pub async fn run_bulk_upload(&self) -> Result<Vec<UploadResult>> {
        self.run_bulk_upload_with_cancellation(CancellationToken::new())
            .await
    }

    /// Like [`run_bulk_upload`](Self::run_bulk_upload), returning partial
    /// results when `cancel` fires.
    #[instrument(skip(self, cancel), fields(media_root = %self.config.media_root.display()))]
    pub async fn run_bulk_upload_with_cancellation(
        &self,
        cancel: CancellationToken,
    ) -> Result<Vec<UploadResult>> {
        let _running = self.run_lock.try_lock().map_err(|_| {
            warn!("Bulk upload requested while another is running");
            CoreError::RunInProgress
        })?;

        if !self.manager.ensure_authenticated().await? {
            return Err(CoreError::AuthorizationRequired);
        }

        let groups = self.discovery.discover(&self.config.media_root).await?;
        let results = self
            .orchestrator
            .run_with_cancellation(&groups, cancel)
            .await?;

        Ok(results)
    }
}

/// Convenience bootstrapper for desktop hosts.
///
/// ```ignore
/// use core_service::bootstrap_desktop;
///
/// let service = bootstrap_desktop(config)?;
/// if !service.bootstrap().await? {
///     println!("Visit {}", service.start_authorization().await?);
/// }
/// ```
#[cfg(feature = "desktop-shims")]
pub fn bootstrap_desktop(config: UploaderConfig) -> Result<UploaderService> {
    use bridge_desktop::{FileSecureStore, ReqwestHttpClient, TokioFileSystem};
    use provider_google_photos::PHOTOS_API_BASE;

    let http_client: Arc<dyn HttpClient> =
        Arc::new(ReqwestHttpClient::new().map_err(initialization_failed)?);
    let album_service = Arc::new(desktop_album_service(PHOTOS_API_BASE)?);
    let secure_store = Arc::new(FileSecureStore::new(config.credential_path.clone()));

    let deps = UploaderDependencies::new(
        http_client,
        Arc::new(TokioFileSystem::new()),
        secure_store,
        album_service,
    );
    UploaderService::new(config, deps)
}

/// Connector whose HTTP client sends each request once. Album creation and
/// uploads are retried by the orchestrator, which bounds the total attempts.
#[cfg(feature = "desktop-shims")]
fn desktop_album_service(
    api_base: &str,
) -> Result<provider_google_photos::GooglePhotosConnector> {
    use bridge_desktop::{ReqwestHttpClient, TransportRetry};

    let client = ReqwestHttpClient::new()
        .map_err(initialization_failed)?
        .with_retry(TransportRetry::disabled());
    Ok(provider_google_photos::GooglePhotosConnector::with_base_url(
        Arc::new(client),
        api_base,
    ))
}

#[cfg(feature = "desktop-shims")]
fn initialization_failed(e: bridge_traits::error::BridgeError) -> CoreError {
    CoreError::InitializationFailed(e.to_string())
}
