//! Staged drafts: upload, testing progress, reviewer decisions and publication.
//!
//! Every status change goes through the lifecycle transition table first, so
//! an illegal request leaves `versions.json` untouched. Each accepted change is
//! appended to the draft's `log.json`; reviewer decisions also go to `chat.json`.

use crate::layout::{chat_key, files_dir, log_key, versions_key};
use crate::pipeline::ToolError;
use crate::ports::{Clock, PackageSource, Reviewer, ReviewerDirectory};
use crate::settings::Settings;
use anyhow::{Context, anyhow, bail};
use backoffice_lifecycle::{Event, ReviewerSet, TransitionError, authorized_transition, transition};
use backoffice_reports::validate_resource_id;
use backoffice_store::{Store, join_key, load_json, save_json};
use backoffice_types::log::{Chat, Log, LogEntry, Message};
use backoffice_types::versions::{
    LifecycleState, PublishNumber, PublishedStatus, PublishedVersionInfo, StageNumber,
    StagedStatus, StagedVersionInfo, VersionLabel, Versions, staged_label,
};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use tracing::{info, warn};

/// File names a package manifest may have; both are written on staging.
pub const MANIFEST_NAMES: [&str; 2] = ["rdf.yaml", "bioimageio.yaml"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageOutcome {
    pub number: StageNumber,
    pub state: LifecycleState,
    /// Older drafts marked superseded by this one.
    pub superseded: Vec<StageNumber>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishOutcome {
    pub stage_number: StageNumber,
    pub publish_number: PublishNumber,
    pub superseded: Vec<StageNumber>,
}

/// Reviewers match on account id, GitHub user or email.
struct ReviewerList(Vec<Reviewer>);

impl ReviewerSet for ReviewerList {
    fn is_reviewer(&self, user: &str) -> bool {
        self.0.iter().any(|r| {
            [&r.id, &r.github_user, &r.email]
                .iter()
                .any(|key| !key.is_empty() && key.eq_ignore_ascii_case(user))
        })
    }
}

/// Staged-draft operations on one collection store.
pub struct Staging<'a> {
    settings: &'a Settings,
    store: &'a dyn Store,
    reviewers: &'a dyn ReviewerDirectory,
    clock: &'a dyn Clock,
}

impl<'a> Staging<'a> {
    pub fn new(
        settings: &'a Settings,
        store: &'a dyn Store,
        reviewers: &'a dyn ReviewerDirectory,
        clock: &'a dyn Clock,
    ) -> Self {
        Self {
            settings,
            store,
            reviewers,
            clock,
        }
    }

    fn root(&self) -> &str {
        &self.settings.collection_root
    }

    /// The resource's `versions.json`, empty when it has none yet.
    ///
    /// Every draft operation reads this first, so an id that would address a
    /// key outside the resource's folder is rejected before any I/O.
    pub fn versions(&self, id: &str) -> anyhow::Result<Versions> {
        validate_resource_id(id)?;
        Ok(load_json(self.store, &versions_key(self.root(), id))?.unwrap_or_default())
    }

    fn save_versions(&self, id: &str, current: &Versions, update: Versions) -> anyhow::Result<()> {
        let merged = current
            .merged(update)
            .with_context(|| format!("update versions of {id}"))?;
        save_json(self.store, &versions_key(self.root(), id), &merged)
    }

    fn reviewer_set(&self) -> anyhow::Result<ReviewerList> {
        Ok(ReviewerList(
            self.reviewers.reviewers().context("load reviewers")?,
        ))
    }

    /// Upload a package as the next staged version and move it to `testing`.
    ///
    /// An invalid package leaves the draft in `error` and returns the reason.
    pub fn stage(&self, id: &str, package: &dyn PackageSource) -> Result<StageOutcome, ToolError> {
        let versions = self.versions(id)?;
        let n = versions.next_stage_number();
        self.apply(id, n, Event::Upload, None, |_| {})?;
        info!(resource = %id, staged = n, "staging package");

        let sem_ver = match self.unpack(id, n, package, &versions) {
            Ok(sem_ver) => sem_ver,
            Err(e) => {
                let message = format!("{e:#}");
                warn!(resource = %id, staged = n, error = %message, "unpacking failed");
                self.apply(id, n, Event::UnpackFailed, None, |record| {
                    record.status.description = message;
                    record.status.during = Some(LifecycleState::Unpacking);
                })?;
                return Err(e.context(format!("stage {id} {}", staged_label(n))).into());
            }
        };

        self.apply(id, n, Event::UnpackSucceeded, None, |record| {
            record.sem_ver = sem_ver;
        })?;
        let superseded = self.supersede_older(id, n)?;
        let record = self.apply(id, n, Event::TestsStarted, None, |_| {})?;

        Ok(StageOutcome {
            number: n,
            state: record.status.name,
            superseded,
        })
    }

    /// Enter `testing`, or update the progress description while testing.
    pub fn set_testing(
        &self,
        id: &str,
        n: StageNumber,
        description: Option<String>,
    ) -> Result<StagedVersionInfo, ToolError> {
        let versions = self.versions(id)?;
        match versions.staged.get(&n) {
            Some(current) if current.status.name == LifecycleState::Testing => {
                let mut record = current.clone();
                let mut status = StagedStatus::new(LifecycleState::Testing, self.clock.now())
                    .with_run_url(self.settings.run_url.clone());
                if let Some(description) = description {
                    status = status.with_description(description);
                }
                record.status = status;

                let mut update = Versions::default();
                update.staged.insert(n, record.clone());
                self.save_versions(id, &versions, update)?;
                self.append_log(
                    id,
                    VersionLabel::Staged(n),
                    format!("testing: {}", record.status.description),
                    None,
                )?;
                Ok(record)
            }
            _ => self.apply(id, n, Event::TestsStarted, None, |record| {
                if let Some(description) = description {
                    record.status.description = description;
                }
            }),
        }
    }

    /// All dynamic tests completed.
    pub fn await_review(&self, id: &str, n: StageNumber) -> Result<StagedVersionInfo, ToolError> {
        self.apply(id, n, Event::TestsCompleted, None, |_| {})
    }

    /// Validation or testing crashed.
    pub fn record_crash(
        &self,
        id: &str,
        n: StageNumber,
        message: &str,
    ) -> Result<StagedVersionInfo, ToolError> {
        let during = self.versions(id)?.staged.get(&n).map(|r| r.status.name);
        self.apply(id, n, Event::Crash, None, |record| {
            record.status.description = message.to_string();
            record.status.during = during;
        })
    }

    /// A reviewer asks for changes to the latest staged version.
    pub fn request_changes(
        &self,
        id: &str,
        reviewer: &str,
        reason: &str,
    ) -> Result<StagedVersionInfo, ToolError> {
        let n = self.latest_staged(id, Event::RequestChanges)?;
        let record = self.apply(id, n, Event::RequestChanges, Some(reviewer), |record| {
            if !reason.trim().is_empty() {
                record.status.description = reason.to_string();
            }
        })?;
        self.append_chat(
            id,
            VersionLabel::Staged(n),
            reviewer,
            format!("{reviewer} requested changes: {reason}"),
        )?;
        Ok(record)
    }

    /// A reviewer accepts the latest staged version, which is then published.
    pub fn publish(&self, id: &str, reviewer: &str) -> Result<PublishOutcome, ToolError> {
        let n = self.latest_staged(id, Event::Accept)?;
        let versions = self.versions(id)?;
        let staged = versions
            .staged
            .get(&n)
            .ok_or_else(|| TransitionError::UnknownVersion {
                id: id.to_string(),
                number: n,
            })?;
        let state = staged.status.name;
        let sem_ver = staged.sem_ver.clone();

        if state == LifecycleState::Accepted {
            // Resume a publication that was interrupted after acceptance.
            if !self.reviewer_set()?.is_reviewer(reviewer) {
                return Err(TransitionError::NotAReviewer {
                    user: reviewer.to_string(),
                    event: Event::Publish,
                }
                .into());
            }
        } else {
            authorized_transition(Some(state), Event::Accept, reviewer, &self.reviewer_set()?)?;
        }

        // A publication interrupted after the copy already owns a publish number.
        let resumed = versions
            .published
            .iter()
            .find(|(_, info)| info.status.stage_number == n)
            .map(|(p, _)| *p);

        if let Some(sem_ver) = &sem_ver
            && versions
                .published
                .values()
                .any(|p| p.status.stage_number != n && p.sem_ver.as_ref() == Some(sem_ver))
        {
            return Err(anyhow!("version {sem_ver} of {id} was already published").into());
        }

        if state != LifecycleState::Accepted {
            self.apply(id, n, Event::Accept, Some(reviewer), |_| {})?;
            self.append_chat(
                id,
                VersionLabel::Staged(n),
                reviewer,
                format!("{reviewer} accepted {}", staged_label(n)),
            )?;
        }

        let p = match resumed {
            Some(p) => {
                info!(resource = %id, staged = n, published = p, "resuming publication");
                p
            }
            None => self.copy_to_published(id, n, sem_ver)?,
        };

        self.apply(id, n, Event::Publish, None, |record| {
            record.status.publish_number = Some(p);
        })?;
        self.append_log(
            id,
            VersionLabel::Published(p),
            format!("published from {}", staged_label(n)),
            None,
        )?;
        let superseded = self.supersede_older(id, n)?;
        info!(resource = %id, staged = n, published = p, "published");

        Ok(PublishOutcome {
            stage_number: n,
            publish_number: p,
            superseded,
        })
    }

    /// Copy staged version `n` to the next publish number and record it.
    fn copy_to_published(
        &self,
        id: &str,
        n: StageNumber,
        sem_ver: Option<String>,
    ) -> anyhow::Result<PublishNumber> {
        let versions = self.versions(id)?;
        let p = versions.next_publish_number();
        let from = files_dir(self.root(), id, VersionLabel::Staged(n));
        let to = files_dir(self.root(), id, VersionLabel::Published(p));
        self.store
            .copy_prefix(&from, &to)
            .with_context(|| format!("copy {from} to {to}"))?;
        self.renumber_manifest(&to, p)?;

        let now = self.clock.now();
        let mut update = Versions::default();
        update.published.insert(
            p,
            PublishedVersionInfo {
                sem_ver,
                timestamp: now,
                status: PublishedStatus {
                    stage_number: n,
                    timestamp: now,
                    run_url: self.settings.run_url.clone(),
                },
                doi: None,
            },
        );
        self.save_versions(id, &versions, update)?;
        Ok(p)
    }

    pub fn log(&self, id: &str, label: VersionLabel) -> anyhow::Result<Log> {
        validate_resource_id(id)?;
        Ok(load_json(self.store, &log_key(self.root(), id, label))?.unwrap_or_default())
    }

    pub fn chat(&self, id: &str, label: VersionLabel) -> anyhow::Result<Chat> {
        validate_resource_id(id)?;
        Ok(load_json(self.store, &chat_key(self.root(), id, label))?.unwrap_or_default())
    }

    pub fn append_log(
        &self,
        id: &str,
        label: VersionLabel,
        message: impl Into<String>,
        details: Option<Value>,
    ) -> anyhow::Result<()> {
        let entry = LogEntry {
            message: message.into(),
            details,
            timestamp: self.clock.now(),
            run_url: self.settings.run_url.clone(),
        };
        let log = self.log(id, label)?.extended(Log {
            entries: vec![entry],
            ..Log::default()
        });
        save_json(self.store, &log_key(self.root(), id, label), &log)
    }

    pub fn append_chat(
        &self,
        id: &str,
        label: VersionLabel,
        author: &str,
        text: impl Into<String>,
    ) -> anyhow::Result<()> {
        let chat = self.chat(id, label)?.extended(Chat {
            messages: vec![Message {
                author: author.to_string(),
                text: text.into(),
                timestamp: self.clock.now(),
            }],
        });
        save_json(self.store, &chat_key(self.root(), id, label), &chat)
    }

    fn latest_staged(&self, id: &str, event: Event) -> Result<StageNumber, ToolError> {
        self.versions(id)?
            .latest_stage_number()
            .ok_or_else(|| TransitionError::Illegal { from: None, event }.into())
    }

    /// Run `event` on staged version `n` and persist the resulting status.
    fn apply(
        &self,
        id: &str,
        n: StageNumber,
        event: Event,
        actor: Option<&str>,
        customize: impl FnOnce(&mut StagedVersionInfo),
    ) -> Result<StagedVersionInfo, ToolError> {
        let versions = self.versions(id)?;
        let existing = versions.staged.get(&n);
        if existing.is_none() && event != Event::Upload {
            return Err(TransitionError::UnknownVersion {
                id: id.to_string(),
                number: n,
            }
            .into());
        }

        let from = existing.map(|r| r.status.name);
        let next = match actor {
            Some(actor) => authorized_transition(from, event, actor, &self.reviewer_set()?)?,
            None => transition(from, event)?,
        };

        let now = self.clock.now();
        let status = StagedStatus::new(next, now).with_run_url(self.settings.run_url.clone());
        let mut record = match existing {
            Some(existing) => StagedVersionInfo {
                status,
                ..existing.clone()
            },
            None => StagedVersionInfo {
                sem_ver: None,
                timestamp: now,
                status,
            },
        };
        customize(&mut record);

        let mut update = Versions::default();
        update.staged.insert(n, record.clone());
        self.save_versions(id, &versions, update)?;
        self.append_log(
            id,
            VersionLabel::Staged(n),
            format!("{next}: {}", record.status.description),
            None,
        )?;
        info!(resource = %id, staged = n, event = %event, to = %next, "draft transition");
        Ok(record)
    }

    fn supersede_older(&self, id: &str, n: StageNumber) -> Result<Vec<StageNumber>, ToolError> {
        let older: Vec<StageNumber> = self
            .versions(id)?
            .staged
            .iter()
            .filter(|(m, record)| **m < n && !record.status.name.is_terminal())
            .map(|(m, _)| *m)
            .collect();
        for m in &older {
            self.apply(id, *m, Event::Supersede, None, |record| {
                record.status.by = Some(n);
            })?;
        }
        Ok(older)
    }

    /// Copy the package into `staged/<n>/files` and return its semantic version.
    fn unpack(
        &self,
        id: &str,
        n: StageNumber,
        package: &dyn PackageSource,
        versions: &Versions,
    ) -> anyhow::Result<Option<String>> {
        let files = package.list().context("list package")?;
        if files.is_empty() {
            bail!("package is empty");
        }
        let manifest_name = MANIFEST_NAMES
            .iter()
            .copied()
            .find(|name| files.iter().any(|f| f == *name))
            .with_context(|| {
                format!("package has no {} at its root", MANIFEST_NAMES.join(" or "))
            })?;
        let mut content = parse_manifest(&package.read(manifest_name)?)
            .with_context(|| format!("invalid {manifest_name}"))?;
        self.validate_manifest(id, &content, versions)?;

        let dir = files_dir(self.root(), id, VersionLabel::Staged(n));
        for rel in files.iter().filter(|f| !MANIFEST_NAMES.contains(&f.as_str())) {
            self.store
                .put(&join_key(&[&dir, rel]), &package.read(rel)?)
                .with_context(|| format!("stage {rel}"))?;
        }

        let sem_ver = match content.get("version") {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Number(v)) => Some(v.to_string()),
            _ => None,
        };
        content.insert("id".to_string(), Value::String(id.to_string()));
        content.insert("version_number".to_string(), Value::from(n));
        write_manifest(self.store, &dir, &content)?;
        Ok(sem_ver)
    }

    fn validate_manifest(
        &self,
        id: &str,
        content: &Map<String, Value>,
        versions: &Versions,
    ) -> anyhow::Result<()> {
        if let Some(declared) = content.get("id")
            && declared.as_str() != Some(id)
        {
            bail!("manifest id {declared} does not match resource id '{id}'");
        }
        if content
            .get("name")
            .and_then(Value::as_str)
            .is_none_or(|name| name.trim().is_empty())
        {
            bail!("manifest is missing `name`");
        }
        let uploader = content
            .get("uploader")
            .and_then(|u| u.get("email"))
            .and_then(Value::as_str)
            .map(str::trim)
            .unwrap_or_default();
        if uploader.is_empty() {
            bail!("manifest is missing `uploader.email`");
        }

        let Some(p) = versions.latest_publish_number() else {
            return Ok(());
        };
        let key = join_key(&[
            &files_dir(self.root(), id, VersionLabel::Published(p)),
            MANIFEST_NAMES[0],
        ]);
        let previous = match self.store.get(&key)? {
            Some(bytes) => parse_manifest(&bytes).with_context(|| format!("parse {key}"))?,
            None => {
                warn!(path = %self.store.location(&key), "published manifest missing");
                Map::new()
            }
        };

        let mut allowed = contacts(&previous);
        for r in self.reviewers.reviewers().context("load reviewers")? {
            allowed.extend(
                [r.id, r.email, r.github_user]
                    .into_iter()
                    .filter(|k| !k.is_empty())
                    .map(|k| k.to_lowercase()),
            );
        }
        if !allowed.contains(&uploader.to_lowercase()) {
            bail!(
                "{uploader} may not upload a new version of '{id}': not the previous uploader, an author, a maintainer or a reviewer"
            );
        }
        Ok(())
    }

    /// Set `version_number` of the manifests below `dir`.
    fn renumber_manifest(&self, dir: &str, number: PublishNumber) -> anyhow::Result<()> {
        let key = join_key(&[dir, MANIFEST_NAMES[0]]);
        let bytes = self
            .store
            .get(&key)?
            .with_context(|| format!("{} missing", self.store.location(&key)))?;
        let mut content = parse_manifest(&bytes).with_context(|| format!("parse {key}"))?;
        content.insert("version_number".to_string(), Value::from(number));
        write_manifest(self.store, dir, &content)
    }
}

fn parse_manifest(bytes: &[u8]) -> anyhow::Result<Map<String, Value>> {
    match serde_yaml::from_slice::<Value>(bytes).context("parse yaml")? {
        Value::Object(map) => Ok(map),
        _ => bail!("manifest is not a mapping"),
    }
}

fn write_manifest(store: &dyn Store, dir: &str, content: &Map<String, Value>) -> anyhow::Result<()> {
    let yaml = serde_yaml::to_string(content).context("serialize manifest")?;
    for name in MANIFEST_NAMES {
        store.put(&join_key(&[dir, name]), yaml.as_bytes())?;
    }
    Ok(())
}

/// Lowercased emails and GitHub users of a manifest's uploader, authors and maintainers.
fn contacts(manifest: &Map<String, Value>) -> BTreeSet<String> {
    let people = manifest
        .get("uploader")
        .into_iter()
        .chain(["authors", "maintainers"].into_iter().flat_map(|field| {
            manifest
                .get(field)
                .and_then(Value::as_array)
                .into_iter()
                .flatten()
        }));

    people
        .flat_map(|person| ["email", "github_user"].map(|k| person.get(k).and_then(Value::as_str)))
        .flatten()
        .map(|k| k.trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn contacts_collects_uploader_authors_and_maintainers() {
        let manifest = json!({
            "uploader": {"email": "Up@Example.org"},
            "authors": [{"name": "A", "github_user": "alice"}, {"name": "B"}],
            "maintainers": [{"email": "m@example.org", "github_user": "mia"}],
        });
        let Value::Object(map) = manifest else {
            unreachable!()
        };
        let found: Vec<String> = contacts(&map).into_iter().collect();
        assert_eq!(found, vec!["alice", "m@example.org", "mia", "up@example.org"]);
    }

    #[test]
    fn reviewer_list_matches_any_handle() {
        let list = ReviewerList(vec![Reviewer {
            id: "github|42".to_string(),
            github_user: "Reviewer".to_string(),
            ..Reviewer::default()
        }]);
        assert!(list.is_reviewer("github|42"));
        assert!(list.is_reviewer("reviewer"));
        assert!(!list.is_reviewer(""));
        assert!(!list.is_reviewer("someone"));
    }

    #[test]
    fn non_mapping_manifest_is_rejected() {
        assert!(parse_manifest(b"- a\n- b\n").is_err());
        assert!(parse_manifest(b"name: x\n").is_ok());
    }
}
