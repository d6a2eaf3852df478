// StrategyCatalog - data-driven strategy list construction
//
// Ordering is by empirically likely success rate, not by guaranteed
// quality: an unauthenticated mobile identity historically clears the
// provider's anti-bot checks more often than a cookie-backed desktop one,
// so it goes first even though the cookie strategies can unlock more
// renditions. Strategies whose credential source is absent are omitted
// entirely rather than emitted in an expected-to-fail state.

use crate::models::{
    ClientIdentity, Credential, CredentialSnapshot, DownloadRequest, FormatSpec, MediaKind,
    Strategy,
};

/// Enumerates which named cookie stores / tokens are currently usable.
/// Queried once per request, at request-construction time.
pub trait CredentialSource {
    fn available_cookie_stores(&self) -> Vec<String>;

    fn auth_token(&self) -> Option<String> {
        None
    }

    /// Freeze current availability into an immutable per-request snapshot.
    fn snapshot(&self) -> CredentialSnapshot {
        CredentialSnapshot::new(self.available_cookie_stores(), self.auth_token())
    }
}

/// A credential source that reports nothing as available.
pub struct NoCredentials;

impl CredentialSource for NoCredentials {
    fn available_cookie_stores(&self) -> Vec<String> {
        Vec::new()
    }
}

pub struct StrategyCatalog;

impl StrategyCatalog {
    /// Build the ordered strategy list for one request.
    ///
    /// Pure and deterministic: same request, same list. The list always
    /// ends with an uncapped "best available" entry flagged
    /// `may_violate_floor`, so it is never empty.
    pub fn build(request: &DownloadRequest) -> Vec<Strategy> {
        let mut strategies = match request.kind {
            MediaKind::Video => Self::video_strategies(request),
            MediaKind::Audio => Self::audio_strategies(request),
        };

        for (i, s) in strategies.iter_mut().enumerate() {
            s.ordinal = i + 1;
        }
        strategies
    }

    fn video_strategies(request: &DownloadRequest) -> Vec<Strategy> {
        let floor = nonzero(request.quality_floor);
        let ceiling = request.quality_target;
        let capped = FormatSpec::video_floor(floor, ceiling);
        let creds = &request.credentials;
        let mut out = Vec::new();

        out.push(Strategy {
            ordinal: 0,
            client: ClientIdentity::Android,
            credential: Credential::None,
            format: capped.clone(),
            description: "android client, no credentials".to_string(),
            may_violate_floor: false,
        });

        for store in &creds.cookie_stores {
            out.push(Strategy {
                ordinal: 0,
                client: ClientIdentity::Web,
                credential: Credential::CookieStore(store.clone()),
                format: capped.clone(),
                description: format!("web client, {} cookies", store),
                may_violate_floor: false,
            });
        }

        if let Some(token) = &creds.auth_token {
            out.push(Strategy {
                ordinal: 0,
                client: ClientIdentity::Android,
                credential: Credential::Token(token.clone()),
                format: capped.clone(),
                description: "android client, auth token".to_string(),
                may_violate_floor: false,
            });
        }

        if let Some(store) = creds.cookie_stores.first() {
            out.push(Strategy {
                ordinal: 0,
                client: ClientIdentity::TvEmbedded,
                credential: Credential::CookieStore(store.clone()),
                format: capped.clone(),
                description: format!("tv embedded client, {} cookies", store),
                may_violate_floor: false,
            });
        }

        out.push(Self::last_resort(request));
        out
    }

    fn audio_strategies(request: &DownloadRequest) -> Vec<Strategy> {
        let floor = nonzero(request.quality_floor);
        let capped = FormatSpec::audio_floor(floor);
        let creds = &request.credentials;
        let mut out = Vec::new();

        out.push(Strategy {
            ordinal: 0,
            client: ClientIdentity::Android,
            credential: Credential::None,
            format: capped.clone(),
            description: "android client, no credentials (audio)".to_string(),
            may_violate_floor: false,
        });

        for store in &creds.cookie_stores {
            out.push(Strategy {
                ordinal: 0,
                client: ClientIdentity::Web,
                credential: Credential::CookieStore(store.clone()),
                format: capped.clone(),
                description: format!("web client, {} cookies (audio)", store),
                may_violate_floor: false,
            });
        }

        if let Some(token) = &creds.auth_token {
            out.push(Strategy {
                ordinal: 0,
                client: ClientIdentity::Android,
                credential: Credential::Token(token.clone()),
                format: capped,
                description: "android client, auth token (audio)".to_string(),
                may_violate_floor: false,
            });
        }

        out.push(Self::last_resort(request));
        out
    }

    /// Uncapped "best available" entry. The orchestrator still applies the
    /// floor policy to its output; the flag only permits the lenient-mode
    /// below-floor acceptance path.
    fn last_resort(request: &DownloadRequest) -> Strategy {
        let format = match request.kind {
            MediaKind::Video => FormatSpec::video_floor(None, None),
            MediaKind::Audio => FormatSpec::audio_floor(None),
        };
        let credential = match request.credentials.cookie_stores.first() {
            Some(store) => Credential::CookieStore(store.clone()),
            None => Credential::None,
        };
        Strategy {
            ordinal: 0,
            client: ClientIdentity::Web,
            credential,
            format,
            description: "best available, quality uncapped".to_string(),
            may_violate_floor: true,
        }
    }
}

fn nonzero(v: u32) -> Option<u32> {
    if v == 0 {
        None
    } else {
        Some(v)
    }
}
