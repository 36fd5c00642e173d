//! Connection URI helpers.

/// Components of a hypervisor URI such as `qemu+ssh://root@host:22/system?x=y`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UriParts {
    pub scheme: String,
    pub username: Option<String>,
    pub host: String,
    pub port: Option<u16>,
    pub path: String,
    pub query: Option<String>,
}

impl UriParts {
    /// Split `uri` into its components. Missing parts come back empty.
    pub fn parse(uri: &str) -> Self {
        let (scheme, rest) = match uri.split_once(':') {
            Some((scheme, rest)) => (scheme.to_string(), rest),
            None => (String::new(), uri),
        };
        let (rest, query) = match rest.split_once('?') {
            Some((rest, query)) => (rest, Some(query.to_string())),
            None => (rest, None),
        };
        let Some(rest) = rest.strip_prefix("//") else {
            return Self {
                scheme,
                path: rest.to_string(),
                query,
                ..Self::default()
            };
        };
        let (authority, path) = match rest.find('/') {
            Some(pos) => (&rest[..pos], rest[pos..].to_string()),
            None => (rest, String::new()),
        };
        let (username, hostport) = match authority.rsplit_once('@') {
            Some((user, hostport)) => (Some(user.to_string()), hostport),
            None => (None, authority),
        };
        let (host, port) = match hostport
            .rsplit_once(':')
            .and_then(|(host, port)| port.parse::<u16>().ok().map(|port| (host, port)))
        {
            Some((host, port)) => (host.to_string(), Some(port)),
            None => (hostport.to_string(), None),
        };
        Self {
            scheme,
            username,
            host,
            port,
            path,
            query,
        }
    }
}

/// `true` when `uri` names a host, i.e. talks to a remote daemon.
pub fn is_uri_remote(uri: &str) -> bool {
    !UriParts::parse(uri).host.is_empty()
}
