use aws_config::meta::region::{ProvideRegion, RegionProviderChain};
use aws_config::retry::RetryConfig;
use aws_config::{BehaviorVersion, ConfigLoader};
use aws_sdk_s3::Client;
use aws_sdk_s3::config::Builder;
use std::time::Duration;

use crate::config::ClientConfig;
use aws_smithy_runtime_api::client::stalled_stream_protection::StalledStreamProtectionConfig;
use aws_smithy_types::timeout::TimeoutConfig;
use aws_types::SdkConfig;
use aws_types::region::Region;

impl ClientConfig {
    pub async fn create_client(&self) -> Client {
        let mut config_builder =
            Builder::from(&self.load_sdk_config().await).force_path_style(self.force_path_style);

        if let Some(timeout_config) = self.build_timeout_config() {
            config_builder = config_builder.timeout_config(timeout_config);
        }

        Client::from_conf(config_builder.build())
    }

    async fn load_sdk_config(&self) -> SdkConfig {
        let config_loader = if self.disable_stalled_stream_protection {
            aws_config::defaults(BehaviorVersion::latest())
                .stalled_stream_protection(StalledStreamProtectionConfig::disabled())
        } else {
            aws_config::defaults(BehaviorVersion::latest())
                .stalled_stream_protection(StalledStreamProtectionConfig::enabled().build())
        };

        let mut config_loader = self
            .load_config_credential(config_loader)
            .region(self.build_region_provider())
            .retry_config(self.build_retry_config());

        if let Some(endpoint_url) = &self.endpoint_url {
            config_loader = config_loader.endpoint_url(endpoint_url);
        };

        config_loader.load().await
    }

    fn load_config_credential(&self, mut config_loader: ConfigLoader) -> ConfigLoader {
        if let Some(profile_name) = &self.profile {
            let provider = aws_config::profile::ProfileFileCredentialsProvider::builder()
                .profile_name(profile_name)
                .build();
            config_loader = config_loader.credentials_provider(provider);
        }

        config_loader
    }

    fn build_region_provider(&self) -> Box<dyn ProvideRegion> {
        let provider_region = if let Some(profile_name) = &self.profile {
            let profile_provider = aws_config::profile::ProfileFileRegionProvider::builder()
                .profile_name(profile_name)
                .build();

            RegionProviderChain::first_try(self.region.clone().map(Region::new))
                .or_else(profile_provider)
        } else {
            RegionProviderChain::first_try(self.region.clone().map(Region::new))
                .or_default_provider()
        };

        Box::new(provider_region)
    }

    fn build_retry_config(&self) -> RetryConfig {
        RetryConfig::standard()
            .with_max_attempts(self.aws_retry_config.aws_max_attempts)
            .with_initial_backoff(std::time::Duration::from_millis(
                self.aws_retry_config.initial_backoff_milliseconds,
            ))
    }

    fn build_timeout_config(&self) -> Option<TimeoutConfig> {
        // TimeoutConfig is optional, but setting each timeout to None does not cause the SDK to use default timeouts.
        let operation_timeout = self
            .cli_timeout_config
            .operation_timeout_milliseconds
            .map(Duration::from_millis);
        let operation_attempt_timeout = self
            .cli_timeout_config
            .operation_attempt_timeout_milliseconds
            .map(Duration::from_millis);
        let connect_timeout = self
            .cli_timeout_config
            .connect_timeout_milliseconds
            .map(Duration::from_millis);
        let read_timeout = self
            .cli_timeout_config
            .read_timeout_milliseconds
            .map(Duration::from_millis);

        if operation_timeout.is_none()
            && operation_attempt_timeout.is_none()
            && connect_timeout.is_none()
            && read_timeout.is_none()
        {
            return None;
        }

        let mut builder = TimeoutConfig::builder();

        if let Some(operation_timeout) = operation_timeout {
            builder = builder.operation_timeout(operation_timeout);
        }

        if let Some(operation_attempt_timeout) = operation_attempt_timeout {
            builder = builder.operation_attempt_timeout(operation_attempt_timeout);
        }

        if let Some(connect_timeout) = connect_timeout {
            builder = builder.connect_timeout(connect_timeout);
        }

        if let Some(read_timeout) = read_timeout {
            builder = builder.read_timeout(read_timeout);
        }

        Some(builder.build())
    }
}

#[cfg(test)]
mod tests {
    use crate::config::{AwsRetryConfig, CLITimeoutConfig, ClientConfig};
    use tracing_subscriber::EnvFilter;

    #[tokio::test]
    async fn create_client_from_profile() {
        init_dummy_tracing_subscriber();

        let client_config = ClientConfig {
            profile: Some("my-profile".to_string()),
            region: Some("my-region".to_string()),
            endpoint_url: Some("https://my.endpoint.local".to_string()),
            force_path_style: true,
            aws_retry_config: AwsRetryConfig {
                aws_max_attempts: 10,
                initial_backoff_milliseconds: 100,
            },
            cli_timeout_config: CLITimeoutConfig {
                operation_timeout_milliseconds: Some(300000),
                operation_attempt_timeout_milliseconds: None,
                connect_timeout_milliseconds: Some(3100),
                read_timeout_milliseconds: None,
            },
            disable_stalled_stream_protection: false,
        };

        let client = client_config.create_client().await;

        let retry_config = client.config().retry_config().unwrap();
        assert_eq!(retry_config.max_attempts(), 10);
        assert_eq!(
            retry_config.initial_backoff(),
            std::time::Duration::from_millis(100)
        );

        let timeout_config = client.config().timeout_config().unwrap();
        assert_eq!(
            timeout_config.operation_timeout(),
            Some(std::time::Duration::from_millis(300000))
        );
        assert_eq!(
            timeout_config.connect_timeout(),
            Some(std::time::Duration::from_millis(3100))
        );
        assert!(timeout_config.read_timeout().is_none());
    }

    #[tokio::test]
    async fn create_client_without_profile() {
        init_dummy_tracing_subscriber();

        let client_config = ClientConfig {
            profile: None,
            region: None,
            endpoint_url: None,
            force_path_style: false,
            aws_retry_config: AwsRetryConfig {
                aws_max_attempts: 3,
                initial_backoff_milliseconds: 100,
            },
            cli_timeout_config: CLITimeoutConfig {
                operation_timeout_milliseconds: None,
                operation_attempt_timeout_milliseconds: None,
                connect_timeout_milliseconds: None,
                read_timeout_milliseconds: None,
            },
            disable_stalled_stream_protection: true,
        };

        let client = client_config.create_client().await;

        let retry_config = client.config().retry_config().unwrap();
        assert_eq!(retry_config.max_attempts(), 3);
        assert!(client.config().timeout_config().is_none());
    }

    fn init_dummy_tracing_subscriber() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env()
                    .or_else(|_| EnvFilter::try_new("dummy=trace"))
                    .unwrap(),
            )
            .try_init();
    }
}
