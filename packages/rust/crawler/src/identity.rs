//! Project/version inference from trunk/branches path layouts.
//!
//! Matching is plain substring work on the path string, not segment parsing:
//! `/repo/app/branches/2.x/src/A.java` belongs to project `app`, version `2.x`.

use trawl_shared::DEFAULT_VERSION;

const BRANCHES_MARKER: &str = "/branches/";
const TRUNK_MARKER: &str = "/trunk/";

/// Project and version derived from a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub project: Option<String>,
    pub version: String,
}

/// Resolve the project and version a path belongs to.
pub fn resolve_identity(path: &str) -> Identity {
    if let Some(marker) = path.find(BRANCHES_MARKER) {
        let start = marker + BRANCHES_MARKER.len();
        let end = path[start..]
            .find('/')
            .map_or(path.len(), |offset| start + offset);

        return Identity {
            project: project_before(path, marker),
            version: path[start..end].to_string(),
        };
    }

    let project = if path.contains("trunk") {
        path.find(TRUNK_MARKER)
            .and_then(|marker| project_before(path, marker))
    } else {
        None
    };

    Identity {
        project,
        version: DEFAULT_VERSION.to_string(),
    }
}

/// The segment between the last `/` before `marker` and `marker` itself.
fn project_before(path: &str, marker: usize) -> Option<String> {
    if marker <= 1 {
        return None;
    }
    let head = &path[..marker];
    let start = head.rfind('/').map_or(0, |slash| slash + 1);
    Some(head[start..].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(project: Option<&str>, version: &str) -> Identity {
        Identity {
            project: project.map(String::from),
            version: version.to_string(),
        }
    }

    #[test]
    fn branch_path() {
        assert_eq!(
            resolve_identity("/svn/proj/branches/v2/file.txt"),
            identity(Some("proj"), "v2")
        );
    }

    #[test]
    fn trunk_path() {
        assert_eq!(
            resolve_identity("/svn/proj/trunk/file.txt"),
            identity(Some("proj"), "trunk")
        );
    }

    #[test]
    fn no_marker() {
        assert_eq!(
            resolve_identity("/home/dev/src/file.txt"),
            identity(None, "trunk")
        );
    }

    #[test]
    fn branches_at_path_start_has_no_project() {
        assert_eq!(
            resolve_identity("/branches/release/file.txt"),
            identity(None, "release")
        );
    }

    #[test]
    fn relative_path_takes_project_from_start() {
        assert_eq!(
            resolve_identity("proj/branches/feature-x/a.c"),
            identity(Some("proj"), "feature-x")
        );
        assert_eq!(
            resolve_identity("proj/trunk/a.c"),
            identity(Some("proj"), "trunk")
        );
    }

    #[test]
    fn first_branches_marker_wins() {
        assert_eq!(
            resolve_identity("/a/branches/b1/c/branches/b2/f.txt"),
            identity(Some("a"), "b1")
        );
    }

    #[test]
    fn branches_takes_precedence_over_trunk() {
        assert_eq!(
            resolve_identity("/x/trunk/y/branches/v3/f.txt"),
            identity(Some("y"), "v3")
        );
    }

    #[test]
    fn trunk_word_without_marker_has_no_project() {
        assert_eq!(
            resolve_identity("/work/trunklike/file.txt"),
            identity(None, "trunk")
        );
    }

    #[test]
    fn branch_without_trailing_slash_runs_to_end() {
        assert_eq!(
            resolve_identity("/repo/proj/branches/readme"),
            identity(Some("proj"), "readme")
        );
    }
}
