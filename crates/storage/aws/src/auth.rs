use aws_sdk_s3::config::Credentials;
use tracing::debug;

use crate::config::S3StorageConfig;

/// Build an S3 client from the given [`S3StorageConfig`].
///
/// Uses the standard AWS SDK environment credential chain unless a static key
/// pair is configured. An endpoint override switches the client to
/// path-style addressing, which S3-compatible local servers expect.
pub async fn build_client(config: &S3StorageConfig) -> aws_sdk_s3::Client {
    let mut loader = aws_config::from_env().region(aws_config::Region::new(config.region.clone()));

    if let Some(endpoint) = &config.endpoint_url {
        debug!(endpoint = %endpoint, "using custom S3 endpoint");
        loader = loader.endpoint_url(endpoint);
    }

    if let Some((access_key_id, secret_access_key)) = config.static_credentials() {
        debug!("using static S3 credentials");
        loader = loader.credentials_provider(Credentials::new(
            access_key_id,
            secret_access_key,
            None,
            None,
            "relay-static",
        ));
    }

    let sdk_config = loader.load().await;
    let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
        .force_path_style(config.endpoint_url.is_some())
        .build();
    aws_sdk_s3::Client::from_conf(s3_config)
}
