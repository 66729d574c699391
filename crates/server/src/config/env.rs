use std::path::PathBuf;
use std::str::FromStr;

use tracing::debug;

use super::RelayConfig;
use crate::error::ServerError;

/// Placeholder marker left in sample `.env` files.
const PLACEHOLDER_PREFIX: &str = "<PUT_YOUR_";

impl RelayConfig {
    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<(), ServerError> {
        self.apply_env_from(|name| std::env::var(name).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    ///
    /// Empty values and unfilled `<PUT_YOUR_...>` placeholders are treated
    /// as unset.
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<(), ServerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_owned())
                .filter(|v| !v.is_empty() && !v.starts_with(PLACEHOLDER_PREFIX))
                .inspect(|_| debug!(variable = name, "applying environment override"))
        };

        if let Some(port) = var("PORT").or_else(|| var("FILE_SERVER_PORT")) {
            self.server.port = parse_var("PORT", &port)?;
        }
        let temp_dir = first(
            &var,
            &[
                "STORAGE_TEMP_LOCATION",
                "STORAGE_TEMP_DIRECTORY",
                "STORAGE_TEMP_FOLDER",
            ],
        );
        if let Some(dir) = temp_dir {
            self.server.temp_dir = PathBuf::from(dir);
        }
        if let Some(trust) = var("TRUST_PROXY") {
            self.server.trust_proxy = parse_bool("TRUST_PROXY", &trust)?;
        }

        if let Some(provider) = var("RATE_LIMIT_PROVIDER") {
            self.rate_limit.provider = provider;
        }
        if let Some(max) = var("MAX_DAILY_UPLOADS") {
            self.rate_limit.max_daily_uploads = parse_var("MAX_DAILY_UPLOADS", &max)?;
        }
        if let Some(max) = var("MAX_DAILY_DOWNLOADS") {
            self.rate_limit.max_daily_downloads = parse_var("MAX_DAILY_DOWNLOADS", &max)?;
        }
        if let Some(url) = first(&var, &["REDIS_URI", "REDIS_URL"]) {
            self.rate_limit.url = Some(url);
        }

        if let Some(provider) = var("DB_PROVIDER") {
            self.repository.provider = provider;
        }
        if let Some(url) = var("DATABASE_URL") {
            self.repository.url = Some(url);
        }

        let storage = &mut self.storage;
        if let Some(provider) = var("STORAGE_PROVIDER") {
            storage.provider = provider;
        }
        if let Some(root) = var("LOCAL_STORAGE_LOCATION") {
            storage.local_root = PathBuf::from(root);
        }
        // AWS_BUCKET and GCP_BUCKET both map to `bucket`; the one matching
        // the selected provider wins.
        let gcp_selected = storage.provider.eq_ignore_ascii_case("gcp")
            || storage.provider.eq_ignore_ascii_case("google");
        let bucket = if gcp_selected {
            var("GCP_BUCKET").or_else(|| var("AWS_BUCKET"))
        } else {
            var("AWS_BUCKET").or_else(|| var("GCP_BUCKET"))
        };
        if bucket.is_some() {
            storage.bucket = bucket;
        }
        set_if_present(&mut storage.region, var("AWS_REGION"));
        set_if_present(&mut storage.access_key_id, var("AWS_ACCESS_KEY_ID"));
        set_if_present(&mut storage.secret_access_key, var("AWS_SECRET_ACCESS_KEY"));
        set_if_present(
            &mut storage.account,
            first(&var, &["AZ_STORAGE_ACCOUNT_NAME", "AZ_ACCOUNT"]),
        );
        set_if_present(
            &mut storage.container,
            first(&var, &["AZ_STORAGE_CONTAINER", "AZ_CONTAINER"]),
        );
        set_if_present(&mut storage.access_key, var("AZ_STORAGE_ACCOUNT_ACCESS_KEY"));
        set_if_present(&mut storage.tenant_id, var("AZ_TENANT_ID"));
        set_if_present(&mut storage.client_id, var("AZ_CLIENT_ID"));
        set_if_present(&mut storage.client_secret, var("AZ_CLIENT_SECRET"));
        set_if_present(
            &mut storage.credentials_path,
            first(&var, &["GCP_KEY_FILE_LOCATION", "GCP_KEY_FILENAME"]),
        );

        if let Some(enabled) = var("GC_ENABLED") {
            self.gc.enabled = parse_bool("GC_ENABLED", &enabled)?;
        }
        if let Some(cron) = var("GC_INACTIVE_CRON") {
            self.gc.schedule = cron;
            self.gc.interval_seconds = None;
        }
        if let Some(duration) = var("GC_INACTIVE_DURATION") {
            self.gc.inactive_after = duration;
        }

        Ok(())
    }
}

/// The first of `names` that is set, in order.
fn first<F>(var: &F, names: &[&str]) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    names.iter().find_map(|name| var(*name))
}

fn set_if_present(field: &mut Option<String>, value: Option<String>) {
    if value.is_some() {
        *field = value;
    }
}

fn parse_var<T: FromStr>(name: &str, value: &str) -> Result<T, ServerError> {
    value
        .parse()
        .map_err(|_| ServerError::Config(format!("{name}: invalid value '{value}'")))
}

fn parse_bool(name: &str, value: &str) -> Result<bool, ServerError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ServerError::Config(format!(
            "{name}: expected a boolean, got '{value}'"
        ))),
    }
}
