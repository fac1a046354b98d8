//! Network profile loader with multi-source merging

use super::profile::{NetworkProfile, ProfileError};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use std::path::PathBuf;

/// Profile loader that handles file discovery and merging
pub struct ProfileLoader;

impl ProfileLoader {
    /// Load the network profile from all sources with proper priority
    ///
    /// Priority (highest to lowest):
    /// 1. `RECONFIG_*` environment variables (`__` as section separator)
    /// 2. Explicit profile path (if provided)
    /// 3. Project root: `./reconfig.toml` or `./.reconfig.toml`
    /// 4. Default values
    pub fn load(profile_path: Option<&PathBuf>) -> Result<NetworkProfile, ProfileError> {
        let mut figment = Figment::from(Serialized::defaults(NetworkProfile::default()));

        for filename in &["reconfig.toml", ".reconfig.toml"] {
            let path = PathBuf::from(filename);
            if path.exists() {
                figment = figment.merge(Toml::file(&path));
                break;
            }
        }

        if let Some(path) = profile_path {
            figment = figment.merge(Toml::file(path));
        }

        figment = figment.merge(Env::prefixed("RECONFIG_").split("__"));

        let profile: NetworkProfile = figment.extract().map_err(Box::new)?;
        profile.validate()?;
        Ok(profile)
    }
}
