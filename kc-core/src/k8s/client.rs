use std::fs;

use kube::config::{
    AuthInfo,
    Cluster,
    Context,
    KubeConfigOptions,
    Kubeconfig,
    NamedAuthInfo,
    NamedCluster,
    NamedContext,
};
use serde::{
    Deserialize,
    Serialize,
};
use tracing::*;

const CLUSTER_NAME: &str = "kubecollect-cluster";
const USER_NAME: &str = "kubecollect-user";
const CONTEXT_NAME: &str = "kubecollect";

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConnectionConfig {
    // If no URL is given, we connect using the in-cluster service account config
    pub url: Option<String>,
    pub ca_cert: Option<String>,
    pub client_cert: Option<String>,
    pub client_key: Option<String>,
    pub ssl_verify_certificate: bool,

    // Path to a file containing a bearer token
    pub auth_token: Option<String>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        ConnectionConfig {
            url: None,
            ca_cert: None,
            client_cert: None,
            client_key: None,
            ssl_verify_certificate: true,
            auth_token: None,
        }
    }
}

pub async fn build_client(conn: &ConnectionConfig) -> anyhow::Result<kube::Client> {
    let config = match &conn.url {
        Some(url) => {
            info!("connecting to k8s server at {url}");
            kube::Config::from_custom_kubeconfig(build_kubeconfig(url, conn), &KubeConfigOptions::default()).await?
        },
        None => {
            info!("connecting to k8s server using in-cluster config");
            let config = kube::Config::incluster()?;
            debug!("in-cluster k8s server: {}", config.cluster_url);
            config
        },
    };

    Ok(kube::Client::try_from(config)?)
}

// We build a one-cluster, one-user kubeconfig out of the connection options and let kube load the
// certificates and token from disk, the same way it would for a kubeconfig file.
pub fn build_kubeconfig(url: &str, conn: &ConnectionConfig) -> Kubeconfig {
    let skip_verify = !conn.ssl_verify_certificate;
    let certificate_authority = if skip_verify { None } else { conn.ca_cert.clone() };
    let token_file = conn.auth_token.as_deref().and_then(check_token_file);

    Kubeconfig {
        clusters: vec![NamedCluster {
            name: CLUSTER_NAME.into(),
            cluster: Some(Cluster {
                server: Some(url.into()),
                insecure_skip_tls_verify: Some(skip_verify),
                certificate_authority,
                ..Default::default()
            }),
        }],
        auth_infos: vec![NamedAuthInfo {
            name: USER_NAME.into(),
            auth_info: Some(AuthInfo {
                client_certificate: conn.client_cert.clone(),
                client_key: conn.client_key.clone(),
                token_file,
                ..Default::default()
            }),
        }],
        contexts: vec![NamedContext {
            name: CONTEXT_NAME.into(),
            context: Some(Context {
                cluster: CLUSTER_NAME.into(),
                user: Some(USER_NAME.into()),
                ..Default::default()
            }),
        }],
        current_context: Some(CONTEXT_NAME.into()),
        ..Default::default()
    }
}

// A token file that can't be read, or that only contains whitespace, would get rejected by the
// apiserver with a fairly unhelpful 401, so we check it up front and connect without a token.
fn check_token_file(path: &str) -> Option<String> {
    match fs::read_to_string(path) {
        Ok(contents) if contents.trim().is_empty() => {
            warn!("no token found in bearer token file {path}");
            None
        },
        Ok(_) => Some(path.into()),
        Err(err) => {
            warn!("unable to read bearer token from {path}: {err}");
            None
        },
    }
}

#[cfg(test)]
mod tests {
    use assert_fs::NamedTempFile;
    use assert_fs::prelude::*;
    use rstest::*;
    use tracing_test::traced_test;

    use super::*;

    const TEST_URL: &str = "https://kube.example.com:6443";

    fn token_file(contents: &str) -> NamedTempFile {
        let file = NamedTempFile::new("token").unwrap();
        file.write_str(contents).unwrap();
        file
    }

    #[rstest]
    fn test_deserialize_defaults() {
        let conn: ConnectionConfig = serde_yaml::from_str("url: https://foo:443").unwrap();
        assert_eq!(conn.url.as_deref(), Some("https://foo:443"));
        assert!(conn.ssl_verify_certificate);
        assert_eq!(conn.auth_token, None);
    }

    #[rstest]
    fn test_build_kubeconfig_verify() {
        let conn = ConnectionConfig {
            url: Some(TEST_URL.into()),
            ca_cert: Some("/certs/ca.crt".into()),
            client_cert: Some("/certs/client.crt".into()),
            client_key: Some("/certs/client.key".into()),
            ..Default::default()
        };
        let kubeconfig = build_kubeconfig(TEST_URL, &conn);

        let cluster = kubeconfig.clusters[0].cluster.as_ref().unwrap();
        assert_eq!(cluster.server.as_deref(), Some(TEST_URL));
        assert_eq!(cluster.insecure_skip_tls_verify, Some(false));
        assert_eq!(cluster.certificate_authority.as_deref(), Some("/certs/ca.crt"));

        let auth_info = kubeconfig.auth_infos[0].auth_info.as_ref().unwrap();
        assert_eq!(auth_info.client_certificate.as_deref(), Some("/certs/client.crt"));
        assert_eq!(auth_info.client_key.as_deref(), Some("/certs/client.key"));
        assert_eq!(auth_info.token_file, None);
        assert_eq!(kubeconfig.current_context.as_deref(), Some(CONTEXT_NAME));
    }

    #[rstest]
    fn test_build_kubeconfig_skip_verify_drops_ca() {
        let conn = ConnectionConfig {
            ca_cert: Some("/certs/ca.crt".into()),
            ssl_verify_certificate: false,
            ..Default::default()
        };
        let kubeconfig = build_kubeconfig(TEST_URL, &conn);

        let cluster = kubeconfig.clusters[0].cluster.as_ref().unwrap();
        assert_eq!(cluster.insecure_skip_tls_verify, Some(true));
        assert_eq!(cluster.certificate_authority, None);
    }

    #[rstest]
    fn test_check_token_file() {
        let file = token_file("abcdef\n");
        let path = file.path().to_str().unwrap();
        assert_eq!(check_token_file(path).as_deref(), Some(path));
    }

    #[rstest]
    #[traced_test]
    fn test_check_token_file_empty() {
        let file = token_file("\n\n");
        assert_eq!(check_token_file(file.path().to_str().unwrap()), None);
        assert!(logs_contain("no token found"));
    }

    #[rstest]
    #[traced_test]
    fn test_check_token_file_whitespace_only() {
        let file = token_file("  \t \n  \n");
        assert_eq!(check_token_file(file.path().to_str().unwrap()), None);
        assert!(logs_contain("no token found"));
    }

    #[rstest]
    #[traced_test]
    fn test_check_token_file_missing() {
        assert_eq!(check_token_file("/does/not/exist/token"), None);
        assert!(logs_contain("unable to read bearer token"));
    }
}
