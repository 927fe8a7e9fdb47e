//! Canonical cache keys for dashboard resources.
//!
//! Each resource family shares a root segment so that invalidating the root
//! prefix reaches every list and detail entry of that family.

use super::client::ListParams;
use crate::query::CacheKey;

const LIST: &str = "list";

fn list_key(root: &str, params: ListParams, extra: Option<&str>) -> CacheKey {
    CacheKey::from_nullable([
        Some(root.to_string()),
        Some(LIST.to_string()),
        params.page.map(|page| format!("page={page}")),
        params.limit.map(|limit| format!("limit={limit}")),
        extra.map(str::to_string),
    ])
}

pub mod newsletters {
    use super::*;

    pub const ROOT: &str = "newsletters";

    pub fn all() -> CacheKey {
        CacheKey::new([ROOT])
    }

    pub fn lists() -> CacheKey {
        all().child(LIST)
    }

    pub fn list(params: ListParams) -> CacheKey {
        list_key(ROOT, params, None)
    }

    pub fn detail(id: i64) -> CacheKey {
        all().child(id.to_string())
    }

    /// Nested under the detail key so a detail invalidation also drops it.
    pub fn preview(id: i64) -> CacheKey {
        detail(id).child("preview")
    }
}

/// Sources have no single-item endpoint, so only list keys exist.
pub mod content_sources {
    use super::*;

    pub const ROOT: &str = "content-sources";

    pub fn all() -> CacheKey {
        CacheKey::new([ROOT])
    }

    pub fn lists() -> CacheKey {
        all().child(LIST)
    }

    pub fn list() -> CacheKey {
        list_key(ROOT, ListParams::default(), None)
    }
}

pub mod subscribers {
    use super::*;

    pub const ROOT: &str = "subscribers";

    pub fn all() -> CacheKey {
        CacheKey::new([ROOT])
    }

    pub fn lists() -> CacheKey {
        all().child(LIST)
    }

    pub fn list(params: ListParams, include_inactive: bool) -> CacheKey {
        list_key(ROOT, params, include_inactive.then_some("all"))
    }

    pub fn detail(id: i64) -> CacheKey {
        all().child(id.to_string())
    }

    pub fn stats() -> CacheKey {
        all().child("stats")
    }
}

pub mod analytics {
    use crate::query::CacheKey;

    pub const ROOT: &str = "analytics";

    pub fn all() -> CacheKey {
        CacheKey::new([ROOT])
    }

    pub fn dashboard() -> CacheKey {
        all().child("dashboard")
    }

    pub fn newsletter(id: i64) -> CacheKey {
        all().child("newsletters").child(id.to_string())
    }
}

pub mod users {
    use crate::query::CacheKey;

    pub const ROOT: &str = "users";

    pub fn profile() -> CacheKey {
        CacheKey::new([ROOT]).child("profile")
    }
}
