//! Store keys of the collection side (staged drafts, published versions).

use backoffice_reports::resource_dir;
use backoffice_store::join_key;
use backoffice_types::file_names;
use backoffice_types::versions::{STAGED_PREFIX, VersionLabel};

/// Top-level `index.json`.
pub fn index_key() -> &'static str {
    file_names::INDEX
}

/// `<root>/<id>`
pub fn resource_key(root: &str, id: &str) -> String {
    join_key(&[root, &resource_dir(id)])
}

/// `<root>/<id>/versions.json`
pub fn versions_key(root: &str, id: &str) -> String {
    join_key(&[&resource_key(root, id), file_names::VERSIONS])
}

/// `<root>/<id>/staged/<n>` or `<root>/<id>/<n>`
pub fn version_dir(root: &str, id: &str, label: VersionLabel) -> String {
    match label {
        VersionLabel::Staged(n) => join_key(&[
            &resource_key(root, id),
            STAGED_PREFIX,
            &n.to_string(),
        ]),
        VersionLabel::Published(n) => join_key(&[&resource_key(root, id), &n.to_string()]),
    }
}

/// Package files of a version.
pub fn files_dir(root: &str, id: &str, label: VersionLabel) -> String {
    join_key(&[&version_dir(root, id, label), "files"])
}

pub fn log_key(root: &str, id: &str, label: VersionLabel) -> String {
    join_key(&[&version_dir(root, id, label), file_names::LOG])
}

pub fn chat_key(root: &str, id: &str, label: VersionLabel) -> String {
    join_key(&[&version_dir(root, id, label), file_names::CHAT])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staged_and_published_keys() {
        assert_eq!(
            files_dir("collection", "affable-shark", VersionLabel::Staged(3)),
            "collection/affable-shark/staged/3/files"
        );
        assert_eq!(
            log_key("collection", "affable-shark", VersionLabel::Published(1)),
            "collection/affable-shark/1/log.json"
        );
        assert_eq!(
            versions_key("", "ns:affable-shark"),
            "ns_affable-shark/versions.json"
        );
    }
}
