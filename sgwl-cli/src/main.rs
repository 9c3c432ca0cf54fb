use std::collections::HashMap;
use std::path::{Path, PathBuf};

use clap::{ArgAction, Parser};
use colored::Colorize;

use sgwl_core::config::{self, DEFAULT_SETTINGS_FILE, Settings, SettingsOverrides};
use sgwl_core::ip::HttpIpResolver;
use sgwl_core::provider::{IpResolver, ProviderResult, SecurityGroupApi};
use sgwl_core::rule::{TARGET_PORT, TargetRule};
use sgwl_core::sync::{SyncOutcome, synchronize};
use sgwl_provider_aliyun::AliyunProvider;

#[derive(Parser)]
#[command(name = "sg-whitelist")]
#[command(
    about = "Allow HTTPS from this machine's public IP in an Alibaba Cloud security group",
    long_about = None
)]
struct Cli {
    /// Access key ID (falls back to ALIBABA_CLOUD_ACCESS_KEY_ID)
    #[arg(long, value_name = "ID")]
    access_key_id: Option<String>,

    /// Access key secret (falls back to ALIBABA_CLOUD_ACCESS_KEY_SECRET)
    #[arg(long, value_name = "SECRET")]
    access_key_secret: Option<String>,

    /// Region ID, e.g. cn-hangzhou (falls back to ALIBABA_CLOUD_REGION_ID)
    #[arg(long, value_name = "REGION")]
    region_id: Option<String>,

    /// Security group ID (falls back to ALIBABA_CLOUD_SECURITY_GROUP_ID)
    #[arg(long, value_name = "ID")]
    security_group_id: Option<String>,

    /// Settings file with KEY=VALUE fallbacks
    #[arg(long, value_name = "PATH", default_value = DEFAULT_SETTINGS_FILE)]
    env_file: PathBuf,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn overrides(&self) -> SettingsOverrides {
        SettingsOverrides {
            access_key_id: self.access_key_id.clone(),
            access_key_secret: self.access_key_secret.clone(),
            region_id: self.region_id.clone(),
            security_group_id: self.security_group_id.clone(),
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let file_values = load_env_file(&cli.env_file);
    let result = run(
        &cli.overrides(),
        |name| std::env::var(name).ok(),
        &file_values,
        HttpIpResolver::new,
        AliyunProvider::new,
    )
    .await;

    if let Err(e) = &result {
        eprintln!("{} {}", "Error:".red().bold(), e);
    }
    std::process::exit(exit_code(&result));
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

/// Load the settings file, warning and continuing without it on failure
fn load_env_file(path: &Path) -> HashMap<String, String> {
    match config::load_settings_file(path) {
        Ok(values) => values,
        Err(e) => {
            println!(
                "{} {}, falling back to environment variables",
                "Warning:".yellow().bold(),
                e
            );
            HashMap::new()
        }
    }
}

fn exit_code<T>(result: &Result<T, String>) -> i32 {
    if result.is_ok() { 0 } else { 1 }
}

/// Resolve configuration, then the public IP, then synchronize the rule
///
/// Configuration is validated before the resolver or provider is built, so a
/// missing setting never leads to a network call.
async fn run<E, R, A, MR, MA>(
    overrides: &SettingsOverrides,
    env: E,
    file_values: &HashMap<String, String>,
    make_resolver: MR,
    make_provider: MA,
) -> Result<SyncOutcome, String>
where
    E: Fn(&str) -> Option<String>,
    R: IpResolver,
    A: SecurityGroupApi,
    MR: FnOnce() -> ProviderResult<R>,
    MA: FnOnce(&Settings) -> ProviderResult<A>,
{
    let settings = config::resolve(overrides, env, file_values).map_err(|e| e.to_string())?;
    log::debug!("Resolved {:?}", settings);

    let resolver = make_resolver().map_err(|e| format!("Failed to create HTTP client: {}", e))?;
    let public_ip = resolver
        .resolve()
        .await
        .map_err(|e| format!("Failed to get public IP: {}", e))?;
    println!("Current public IP: {}", public_ip.bold());

    let provider =
        make_provider(&settings).map_err(|e| format!("Failed to create ECS client: {}", e))?;
    let rule = TargetRule::for_public_ip(&public_ip);

    let outcome = synchronize(&provider, &rule)
        .await
        .map_err(|e| format!("Failed to synchronize security group rule: {}", e))?;

    match outcome {
        SyncOutcome::AlreadyExists => println!(
            "Security group rule for IP {} on port {} already exists. Skipping.",
            public_ip, TARGET_PORT
        ),
        SyncOutcome::Created => println!(
            "{} added security group rule for IP {} on port {}.",
            "Successfully".green().bold(),
            public_ip,
            TARGET_PORT
        ),
    }

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sgwl_core::config::{
        ACCESS_KEY_ID_ENV, ACCESS_KEY_SECRET_ENV, REGION_ID_ENV, SECURITY_GROUP_ID_ENV,
    };
    use sgwl_core::provider::{BoxFuture, ProviderError};
    use sgwl_core::rule::Permission;
    use std::cell::Cell;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeResolver {
        body: &'static str,
        calls: AtomicUsize,
    }

    impl IpResolver for FakeResolver {
        fn resolve(&self) -> BoxFuture<'_, ProviderResult<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let ip = self.body.trim().to_string();
            Box::pin(async move { Ok(ip) })
        }
    }

    impl IpResolver for &FakeResolver {
        fn resolve(&self) -> BoxFuture<'_, ProviderResult<String>> {
            (**self).resolve()
        }
    }

    #[derive(Default)]
    struct FakeApi {
        permissions: Vec<Permission>,
        describe_calls: AtomicUsize,
        authorized: Mutex<Vec<TargetRule>>,
        settings: Mutex<Option<Settings>>,
    }

    impl SecurityGroupApi for &FakeApi {
        fn name(&self) -> &'static str {
            "fake"
        }

        fn describe_permissions(&self) -> BoxFuture<'_, ProviderResult<Vec<Permission>>> {
            self.describe_calls.fetch_add(1, Ordering::SeqCst);
            let permissions = self.permissions.clone();
            Box::pin(async move { Ok(permissions) })
        }

        fn authorize_ingress<'a>(
            &'a self,
            rule: &'a TargetRule,
        ) -> BoxFuture<'a, ProviderResult<()>> {
            self.authorized.lock().unwrap().push(rule.clone());
            Box::pin(async { Ok(()) })
        }
    }

    fn flags() -> SettingsOverrides {
        SettingsOverrides {
            access_key_id: Some("id".to_string()),
            access_key_secret: Some("secret".to_string()),
            region_id: Some("cn-hangzhou".to_string()),
            security_group_id: Some("sg-123".to_string()),
        }
    }

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[tokio::test]
    async fn test_creates_rule_when_group_is_empty() {
        let resolver = FakeResolver {
            body: "198.51.100.7\n",
            calls: AtomicUsize::new(0),
        };
        let api = FakeApi::default();

        let result = run(
            &flags(),
            no_env,
            &HashMap::new(),
            || Ok(&resolver),
            |settings: &Settings| {
                *api.settings.lock().unwrap() = Some(settings.clone());
                Ok(&api)
            },
        )
        .await;

        assert_eq!(result, Ok(SyncOutcome::Created));
        assert_eq!(exit_code(&result), 0);

        let authorized = api.authorized.lock().unwrap();
        assert_eq!(authorized.len(), 1);
        assert_eq!(authorized[0].source_cidr_ip, "198.51.100.7/32");
        assert_eq!(authorized[0].port_range, "443/443");

        let settings = api.settings.lock().unwrap().clone().unwrap();
        assert_eq!(settings.security_group_id, "sg-123");
        assert_eq!(settings.region_id, "cn-hangzhou");
    }

    #[tokio::test]
    async fn test_existing_rule_is_left_alone() {
        let resolver = FakeResolver {
            body: "203.0.113.5",
            calls: AtomicUsize::new(0),
        };
        let api = FakeApi {
            permissions: vec![Permission {
                ip_protocol: "TCP".to_string(),
                port_range: "443/443".to_string(),
                source_cidr_ip: "203.0.113.5/32".to_string(),
                direction: "ingress".to_string(),
                policy: "Accept".to_string(),
                nic_type: "internet".to_string(),
            }],
            ..Default::default()
        };

        let result = run(
            &flags(),
            no_env,
            &HashMap::new(),
            || Ok(&resolver),
            |_: &Settings| Ok(&api),
        )
        .await;

        assert_eq!(result, Ok(SyncOutcome::AlreadyExists));
        assert_eq!(exit_code(&result), 0);
        assert!(api.authorized.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_setting_makes_no_network_calls() {
        let resolver_built = Cell::new(false);
        let provider_built = Cell::new(false);
        let mut overrides = flags();
        overrides.security_group_id = Some(String::new());

        let result = run(
            &overrides,
            no_env,
            &HashMap::new(),
            || {
                resolver_built.set(true);
                Err::<&FakeResolver, _>(ProviderError::client_init("unexpected"))
            },
            |_: &Settings| {
                provider_built.set(true);
                Err::<&FakeApi, _>(ProviderError::client_init("unexpected"))
            },
        )
        .await;

        let err = result.as_ref().unwrap_err();
        assert!(err.contains(SECURITY_GROUP_ID_ENV));
        assert_eq!(exit_code(&result), 1);
        assert!(!resolver_built.get());
        assert!(!provider_built.get());
    }

    #[tokio::test]
    async fn test_settings_from_env_and_file() {
        let resolver = FakeResolver {
            body: "192.0.2.1",
            calls: AtomicUsize::new(0),
        };
        let api = FakeApi::default();
        let file: HashMap<String, String> = [
            (ACCESS_KEY_ID_ENV, "file-id"),
            (ACCESS_KEY_SECRET_ENV, "file-secret"),
            (REGION_ID_ENV, "cn-beijing"),
            (SECURITY_GROUP_ID_ENV, "sg-file"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        let env = |name: &str| (name == REGION_ID_ENV).then(|| "cn-shenzhen".to_string());

        let result = run(
            &SettingsOverrides::default(),
            env,
            &file,
            || Ok(&resolver),
            |settings: &Settings| {
                *api.settings.lock().unwrap() = Some(settings.clone());
                Ok(&api)
            },
        )
        .await;

        assert!(result.is_ok());
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 1);
        assert_eq!(api.describe_calls.load(Ordering::SeqCst), 1);

        let settings = api.settings.lock().unwrap().clone().unwrap();
        assert_eq!(settings.region_id, "cn-shenzhen");
        assert_eq!(settings.security_group_id, "sg-file");
    }

    #[tokio::test]
    async fn test_provider_failure_is_reported() {
        let resolver = FakeResolver {
            body: "192.0.2.1",
            calls: AtomicUsize::new(0),
        };

        let result = run(
            &flags(),
            no_env,
            &HashMap::new(),
            || Ok(&resolver),
            |_: &Settings| Err::<&FakeApi, _>(ProviderError::client_init("bad endpoint")),
        )
        .await;

        assert!(result.unwrap_err().contains("Failed to create ECS client"));
    }

    #[test]
    fn test_missing_env_file_falls_back() {
        let values = load_env_file(Path::new("sg-whitelist-does-not-exist.env"));
        assert!(values.is_empty());
    }

    #[test]
    fn test_cli_parses_flags() {
        let cli = Cli::try_parse_from([
            "sg-whitelist",
            "--access-key-id",
            "id",
            "--region-id",
            "",
            "--env-file",
            "custom.env",
            "-vv",
        ])
        .unwrap();

        let overrides = cli.overrides();
        assert_eq!(overrides.access_key_id.as_deref(), Some("id"));
        assert_eq!(overrides.region_id.as_deref(), Some(""));
        assert_eq!(overrides.security_group_id, None);
        assert_eq!(cli.env_file, PathBuf::from("custom.env"));
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_cli_default_env_file() {
        let cli = Cli::try_parse_from(["sg-whitelist"]).unwrap();
        assert_eq!(cli.env_file, PathBuf::from(".env"));
    }
}
