/// Git metadata captured by the build script, when the source tree is a git checkout.
pub(crate) struct BuildInfo {
    pub(crate) commit_sha1: Option<&'static str>,
    dirty: Option<&'static str>,
}

impl BuildInfo {
    pub(crate) fn git_dirty(&self) -> bool {
        self.dirty == Some("true")
    }
}

pub(crate) const BUILD_INFO: BuildInfo = BuildInfo {
    commit_sha1: option_env!("VERGEN_GIT_SHA"),
    dirty: option_env!("VERGEN_GIT_DIRTY"),
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dirty_flag_reads_vergen_value() {
        let clean = BuildInfo {
            commit_sha1: Some("abc123"),
            dirty: Some("false"),
        };
        let dirty = BuildInfo {
            commit_sha1: Some("abc123"),
            dirty: Some("true"),
        };
        let unknown = BuildInfo {
            commit_sha1: None,
            dirty: None,
        };
        assert!(!clean.git_dirty());
        assert!(dirty.git_dirty());
        assert!(!unknown.git_dirty());
    }
}
