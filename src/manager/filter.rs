//! Profile selection criteria.

use crate::manager::profile::Profile;

/// Criteria a profile must meet to take part in a run.
///
/// Empty name/tag lists place no constraint; a non-empty tag list requires
/// every listed tag to be present on the profile.
#[derive(Clone, Debug)]
pub struct ProfileFilter {
    pub only_active: bool,
    pub names: Vec<String>,
    pub tags: Vec<String>,
}

impl Default for ProfileFilter {
    fn default() -> Self {
        Self {
            only_active: true,
            names: Vec::new(),
            tags: Vec::new(),
        }
    }
}

impl ProfileFilter {
    /// Test a profile against the criteria, returning the rejection reason on
    /// failure. Pure; no side effects.
    pub fn matches(&self, profile: &Profile) -> Result<(), &'static str> {
        if self.only_active && !*profile.active() {
            return Err("not active");
        }

        if !self.names.is_empty() && !self.names.iter().any(|name| name == profile.name()) {
            return Err("name not matched");
        }

        if !self.tags.is_empty() {
            if profile.tags().is_empty() {
                return Err("no tags to match");
            }

            if !self
                .tags
                .iter()
                .all(|tag| profile.tags().iter().any(|t| t == tag))
            {
                return Err("tags not matched");
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(active: bool, name: &str, tags: &[&str]) -> Profile {
        Profile::builder()
            .active(active)
            .name(name)
            .tags(tags.iter().map(|t| t.to_string()).collect())
            .build()
    }

    fn filter(only_active: bool, names: &[&str], tags: &[&str]) -> ProfileFilter {
        ProfileFilter {
            only_active,
            names: names.iter().map(|n| n.to_string()).collect(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    #[test]
    fn test_inactive_rejected_regardless_of_other_fields() {
        let f = filter(true, &["home"], &["nightly"]);
        let p = profile(false, "home", &["nightly"]);
        assert_eq!(f.matches(&p), Err("not active"));
    }

    #[test]
    fn test_inactive_accepted_when_active_not_required() {
        let f = filter(false, &[], &[]);
        let p = profile(false, "home", &[]);
        assert_eq!(f.matches(&p), Ok(()));
    }

    #[test]
    fn test_name_must_be_a_member() {
        let f = filter(true, &["home", "media"], &[]);
        assert_eq!(f.matches(&profile(true, "media", &[])), Ok(()));
        assert_eq!(
            f.matches(&profile(true, "mail", &[])),
            Err("name not matched")
        );
    }

    #[test]
    fn test_profile_without_tags_cannot_match_tag_criteria() {
        let f = filter(true, &[], &["nightly"]);
        assert_eq!(
            f.matches(&profile(true, "home", &[])),
            Err("no tags to match")
        );
    }

    #[test]
    fn test_all_required_tags_must_be_present() {
        let f = filter(true, &[], &["nightly", "critical"]);

        // Strict subset of the required tags fails.
        assert_eq!(
            f.matches(&profile(true, "home", &["nightly"])),
            Err("tags not matched")
        );

        // Equal tag set matches.
        assert_eq!(
            f.matches(&profile(true, "home", &["nightly", "critical"])),
            Ok(())
        );

        // Superset matches too.
        assert_eq!(
            f.matches(&profile(true, "home", &["nightly", "critical", "extra"])),
            Ok(())
        );
    }

    #[test]
    fn test_empty_criteria_match_any_active_profile() {
        let f = ProfileFilter::default();
        assert_eq!(f.matches(&profile(true, "anything", &[])), Ok(()));
    }
}
