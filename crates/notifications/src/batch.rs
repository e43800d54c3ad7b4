//! The reminder batch run: load, classify, render, send, persist.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use chrono::Utc;
use tracing::{debug, info, warn};

use duewatch_core::{ProjectId, RunId, UserId};
use duewatch_directory::{User, NOTIFIABLE_ROLES};
use duewatch_projects::{ItemKind, Project};

use crate::digest;
use crate::render;
use crate::seams::{Mailer, OutboundEmail, ProjectStore, SiteInfo, StoreError, UserDirectory};

/// Counters describing one batch run.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct RunSummary {
    pub projects_scanned: usize,
    pub users_considered: usize,
    pub emails_sent: usize,
    pub emails_failed: usize,
    pub items_reminded: usize,
    pub collections_persisted: usize,
}

/// The reminder batch processor, generic over its collaborator seams.
///
/// A single `run` is synchronous and run-to-completion; the scheduler that
/// fires it lives in infra.
pub struct ReminderBatch<P, D, M, S> {
    projects: P,
    directory: D,
    mailer: M,
    site: S,
}

impl<P, D, M, S> ReminderBatch<P, D, M, S>
where
    P: ProjectStore,
    D: UserDirectory,
    M: Mailer,
    S: SiteInfo,
{
    pub fn new(projects: P, directory: D, mailer: M, site: S) -> Self {
        Self {
            projects,
            directory,
            mailer,
            site,
        }
    }

    /// Run the batch against the current wall clock.
    pub fn run(&self) -> Result<RunSummary, StoreError> {
        self.run_at(Utc::now().timestamp())
    }

    /// Run the batch evaluating due dates against `now` (unix seconds).
    pub fn run_at(&self, now: i64) -> Result<RunSummary, StoreError> {
        let run_id = RunId::new();
        let mut summary = RunSummary::default();

        // Step 1: load projects, dropping the ones with notifications
        // disabled project-wide.
        let mut projects = self.projects.published_projects()?;
        projects.retain(|p| !p.notifications_disabled);
        summary.projects_scanned = projects.len();

        if projects.is_empty() {
            info!(run = %run_id, "no published projects with notifications enabled; nothing to do");
            return Ok(summary);
        }

        // Step 2: candidate users.
        let users: BTreeMap<UserId, User> = self
            .directory
            .users_in_roles(&NOTIFIABLE_ROLES)?
            .into_iter()
            .map(|u| (u.id, u))
            .collect();
        summary.users_considered = users.len();

        let milestone_titles = self.projects.milestone_titles()?;

        // Step 3: classify into the per-run digest table.
        let table = digest::classify(&projects, &users, now);

        let mut project_index: BTreeMap<ProjectId, Project> =
            projects.into_iter().map(|p| (p.id, p)).collect();

        let subject = render::digest_subject(&self.site);
        let admin_email = self.site.admin_email();

        // Steps 4 and 5, per user.
        for (user_id, digests) in table.iter() {
            let Some(user) = users.get(user_id) else {
                continue;
            };

            let mut muted: HashSet<ProjectId> = HashSet::new();
            for project_id in digests.keys() {
                if self.projects.user_muted(*project_id, *user_id)? {
                    muted.insert(*project_id);
                }
            }

            let Some(rendered) = render::render_digest(
                user,
                digests,
                &muted,
                &project_index,
                &milestone_titles,
                &self.site,
            ) else {
                debug!(run = %run_id, user = %user_id, "empty digest; skipping user");
                continue;
            };

            let email = OutboundEmail {
                from: admin_email.clone(),
                to: user.email.clone(),
                recipient_name: user.name.clone(),
                subject: subject.clone(),
                html_body: rendered.html,
            };

            if let Err(e) = self.mailer.send(&email) {
                // Leave this user's reminders untouched; the next run will
                // pick them up again.
                warn!(run = %run_id, user = %user_id, error = %e, "digest delivery failed");
                summary.emails_failed += 1;
                continue;
            }
            summary.emails_sent += 1;

            // Delivery confirmed: mark every reminder on every touched item
            // and write the modified collections back wholesale.
            let mut modified: BTreeSet<(ProjectId, ItemKind)> = BTreeSet::new();
            for (project_id, kind, item_id) in &rendered.touched {
                let Some(project) = project_index.get_mut(project_id) else {
                    continue;
                };
                if let Some(item) = project.items_mut(*kind).get_mut(item_id) {
                    item.mark_all_reminders_sent(now);
                    summary.items_reminded += 1;
                    modified.insert((*project_id, *kind));
                }
            }

            for (project_id, kind) in modified {
                let Some(project) = project_index.get(&project_id) else {
                    continue;
                };
                match self
                    .projects
                    .replace_items(project_id, kind, project.items(kind))
                {
                    Ok(()) => summary.collections_persisted += 1,
                    // The email went out; losing the write means the next
                    // run re-sends rather than silently dropping the marking.
                    Err(e) => warn!(
                        run = %run_id,
                        project = %project_id,
                        kind = %kind,
                        error = %e,
                        "failed to persist reminder state"
                    ),
                }
            }
        }

        info!(
            run = %run_id,
            projects = summary.projects_scanned,
            users = summary.users_considered,
            sent = summary.emails_sent,
            failed = summary.emails_failed,
            items = summary.items_reminded,
            "reminder batch finished"
        );

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex, RwLock};

    use super::*;
    use crate::seams::MailError;
    use duewatch_core::ItemId;
    use duewatch_directory::Role;
    use duewatch_projects::{Item, Reminder};

    const NOW: i64 = 1_700_000_000;
    const DAY: i64 = 86_400;

    #[derive(Default)]
    struct TestStore {
        projects: RwLock<Vec<Project>>,
        muted: HashSet<(ProjectId, UserId)>,
        milestone_titles: HashMap<String, String>,
        users: Vec<User>,
        writes: RwLock<Vec<(ProjectId, ItemKind)>>,
    }

    impl ProjectStore for TestStore {
        fn published_projects(&self) -> Result<Vec<Project>, StoreError> {
            Ok(self.projects.read().unwrap().clone())
        }

        fn milestone_titles(&self) -> Result<HashMap<String, String>, StoreError> {
            Ok(self.milestone_titles.clone())
        }

        fn user_muted(&self, project_id: ProjectId, user_id: UserId) -> Result<bool, StoreError> {
            Ok(self.muted.contains(&(project_id, user_id)))
        }

        fn replace_items(
            &self,
            project_id: ProjectId,
            kind: ItemKind,
            items: &BTreeMap<duewatch_core::ItemId, Item>,
        ) -> Result<(), StoreError> {
            let mut projects = self.projects.write().unwrap();
            let project = projects
                .iter_mut()
                .find(|p| p.id == project_id)
                .ok_or(StoreError::ProjectNotFound(project_id))?;
            project.set_items(kind, items.clone());
            self.writes.write().unwrap().push((project_id, kind));
            Ok(())
        }
    }

    impl UserDirectory for TestStore {
        fn users_in_roles(&self, roles: &[Role]) -> Result<Vec<User>, StoreError> {
            Ok(self
                .users
                .iter()
                .filter(|u| roles.contains(&u.role))
                .cloned()
                .collect())
        }
    }

    #[derive(Default)]
    struct TestMailer {
        sent: Mutex<Vec<OutboundEmail>>,
        fail_for: HashSet<String>,
    }

    impl Mailer for TestMailer {
        fn send(&self, email: &OutboundEmail) -> Result<(), MailError> {
            if self.fail_for.contains(&email.to) {
                return Err(MailError::Delivery(format!("smtp refused {}", email.to)));
            }
            self.sent.lock().unwrap().push(email.clone());
            Ok(())
        }
    }

    struct TestSite;

    impl SiteInfo for TestSite {
        fn site_name(&self) -> String {
            "Acme PM".to_string()
        }

        fn admin_email(&self) -> String {
            "admin@acme.example".to_string()
        }
    }

    fn alice() -> User {
        User::new(UserId::new(3), "Alice", "alice@acme.example", Role::Member)
    }

    fn bob() -> User {
        User::new(UserId::new(5), "Bob", "bob@acme.example", Role::Manager)
    }

    fn task_due_soon(id: &str, assignee: UserId) -> Item {
        let mut item = Item::new(id, ItemKind::Task);
        item.title = Some(format!("Task {id}"));
        item.due_date = Some(NOW + DAY / 2);
        item.assigned_to = vec![assignee];
        item.reminders = vec![Reminder::unsent(3)];
        item
    }

    fn overdue_milestone(id: &str, assignee: UserId) -> Item {
        let mut item = Item::new(id, ItemKind::Milestone);
        item.milestone = Some("ms-beta".to_string());
        item.end_date = Some(NOW - DAY);
        item.assigned_to = vec![assignee];
        item.reminders = vec![Reminder::unsent(1)];
        item
    }

    fn store_with(projects: Vec<Project>, users: Vec<User>) -> Arc<TestStore> {
        Arc::new(TestStore {
            projects: RwLock::new(projects),
            users,
            milestone_titles: [("ms-beta".to_string(), "Beta Launch".to_string())].into(),
            ..Default::default()
        })
    }

    fn batch(
        store: Arc<TestStore>,
        mailer: Arc<TestMailer>,
    ) -> ReminderBatch<Arc<TestStore>, Arc<TestStore>, Arc<TestMailer>, TestSite> {
        ReminderBatch::new(store.clone(), store, mailer, TestSite)
    }

    #[test]
    fn upcoming_task_is_sent_and_marked() {
        let mut project = Project::new(ProjectId::new(1), "Website", "https://pm.example/website");
        project.insert_item(task_due_soon("t-1", UserId::new(3)));

        let store = store_with(vec![project], vec![alice()]);
        let mailer = Arc::new(TestMailer::default());

        let summary = batch(store.clone(), mailer.clone()).run_at(NOW).unwrap();
        assert_eq!(summary.emails_sent, 1);
        assert_eq!(summary.items_reminded, 1);
        assert_eq!(summary.collections_persisted, 1);

        let sent = mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "alice@acme.example");
        assert_eq!(sent[0].from, "admin@acme.example");
        assert_eq!(sent[0].subject, "Acme PM Notifications About Upcoming Due Dates");
        assert!(sent[0].html_body.contains("Task t-1"));

        let projects = store.projects.read().unwrap();
        let item = projects[0]
            .item(ItemKind::Task, &ItemId::from("t-1"))
            .unwrap();
        assert!(item.reminders.iter().all(|r| r.sent && r.sent_at == Some(NOW)));
    }

    #[test]
    fn second_run_sends_nothing() {
        let mut project = Project::new(ProjectId::new(1), "Website", "https://pm.example/website");
        project.insert_item(task_due_soon("t-1", UserId::new(3)));
        project.insert_item(overdue_milestone("m-1", UserId::new(3)));

        let store = store_with(vec![project], vec![alice()]);
        let mailer = Arc::new(TestMailer::default());
        let batch = batch(store, mailer.clone());

        let first = batch.run_at(NOW).unwrap();
        assert_eq!(first.emails_sent, 1);

        let second = batch.run_at(NOW + 60).unwrap();
        assert_eq!(second.emails_sent, 0);
        assert_eq!(second.items_reminded, 0);
        assert_eq!(mailer.sent.lock().unwrap().len(), 1);
    }

    #[test]
    fn past_due_milestone_appears_in_past_due_section() {
        let mut project = Project::new(ProjectId::new(1), "Website", "https://pm.example/website");
        project.insert_item(overdue_milestone("m-1", UserId::new(5)));

        let store = store_with(vec![project], vec![bob()]);
        let mailer = Arc::new(TestMailer::default());

        let summary = batch(store, mailer.clone()).run_at(NOW).unwrap();
        assert_eq!(summary.emails_sent, 1);

        let sent = mailer.sent.lock().unwrap();
        assert!(sent[0].html_body.contains("Past Due Dates"));
        assert!(sent[0].html_body.contains("Beta Launch"));
    }

    #[test]
    fn delivery_failure_leaves_state_untouched_and_recomputes_next_run() {
        let mut project = Project::new(ProjectId::new(1), "Website", "https://pm.example/website");
        project.insert_item(task_due_soon("t-1", UserId::new(3)));

        let store = store_with(vec![project], vec![alice()]);
        let failing = Arc::new(TestMailer {
            fail_for: ["alice@acme.example".to_string()].into(),
            ..Default::default()
        });

        let summary = batch(store.clone(), failing).run_at(NOW).unwrap();
        assert_eq!(summary.emails_failed, 1);
        assert_eq!(summary.emails_sent, 0);
        assert_eq!(summary.items_reminded, 0);
        assert!(store.writes.read().unwrap().is_empty());

        {
            let projects = store.projects.read().unwrap();
            let item = projects[0]
                .item(ItemKind::Task, &ItemId::from("t-1"))
                .unwrap();
            assert!(item.has_unsent_reminders());
        }

        // A healthy mailer picks the same item up on the next run.
        let working = Arc::new(TestMailer::default());
        let summary = batch(store, working.clone()).run_at(NOW + 60).unwrap();
        assert_eq!(summary.emails_sent, 1);
        assert!(working.sent.lock().unwrap()[0].html_body.contains("Task t-1"));
    }

    #[test]
    fn failure_for_one_user_does_not_affect_others() {
        let mut p1 = Project::new(ProjectId::new(1), "Website", "https://pm.example/website");
        p1.insert_item(task_due_soon("t-1", UserId::new(3)));
        let mut p2 = Project::new(ProjectId::new(2), "App", "https://pm.example/app");
        p2.insert_item(task_due_soon("t-2", UserId::new(5)));

        let store = store_with(vec![p1, p2], vec![alice(), bob()]);
        let mailer = Arc::new(TestMailer {
            fail_for: ["alice@acme.example".to_string()].into(),
            ..Default::default()
        });

        let summary = batch(store.clone(), mailer.clone()).run_at(NOW).unwrap();
        assert_eq!(summary.emails_failed, 1);
        assert_eq!(summary.emails_sent, 1);
        assert_eq!(mailer.sent.lock().unwrap()[0].to, "bob@acme.example");

        let projects = store.projects.read().unwrap();
        assert!(projects[0]
            .item(ItemKind::Task, &ItemId::from("t-1"))
            .unwrap()
            .has_unsent_reminders());
        assert!(!projects[1]
            .item(ItemKind::Task, &ItemId::from("t-2"))
            .unwrap()
            .has_unsent_reminders());
    }

    #[test]
    fn project_wide_disable_excludes_the_project() {
        let mut project = Project::new(ProjectId::new(1), "Website", "https://pm.example/website");
        project.notifications_disabled = true;
        project.insert_item(task_due_soon("t-1", UserId::new(3)));

        let store = store_with(vec![project], vec![alice()]);
        let mailer = Arc::new(TestMailer::default());

        let summary = batch(store, mailer.clone()).run_at(NOW).unwrap();
        assert_eq!(summary.projects_scanned, 0);
        assert_eq!(summary.emails_sent, 0);
        assert!(mailer.sent.lock().unwrap().is_empty());
    }

    #[test]
    fn per_user_mute_skips_the_project_and_keeps_reminders_unsent() {
        let mut project = Project::new(ProjectId::new(1), "Website", "https://pm.example/website");
        project.insert_item(task_due_soon("t-1", UserId::new(3)));

        let store = Arc::new(TestStore {
            projects: RwLock::new(vec![project]),
            users: vec![alice()],
            muted: [(ProjectId::new(1), UserId::new(3))].into(),
            ..Default::default()
        });
        let mailer = Arc::new(TestMailer::default());

        let summary = batch(store.clone(), mailer.clone()).run_at(NOW).unwrap();
        assert_eq!(summary.emails_sent, 0);
        assert!(mailer.sent.lock().unwrap().is_empty());

        let projects = store.projects.read().unwrap();
        assert!(projects[0]
            .item(ItemKind::Task, &ItemId::from("t-1"))
            .unwrap()
            .has_unsent_reminders());
    }

    #[test]
    fn no_projects_is_a_noop() {
        let store = store_with(Vec::new(), vec![alice()]);
        let mailer = Arc::new(TestMailer::default());

        let summary = batch(store, mailer).run_at(NOW).unwrap();
        assert_eq!(summary, RunSummary::default());
    }

    #[test]
    fn user_without_eligible_items_gets_no_email() {
        let mut item = task_due_soon("t-1", UserId::new(3));
        // Far future: outside every lead-time window.
        item.due_date = Some(NOW + 90 * DAY);
        let mut project = Project::new(ProjectId::new(1), "Website", "https://pm.example/website");
        project.insert_item(item);

        let store = store_with(vec![project], vec![alice()]);
        let mailer = Arc::new(TestMailer::default());

        let summary = batch(store, mailer.clone()).run_at(NOW).unwrap();
        assert_eq!(summary.emails_sent, 0);
        assert!(mailer.sent.lock().unwrap().is_empty());
    }

    #[test]
    fn all_reminders_on_a_touched_item_are_marked_together() {
        let mut item = task_due_soon("t-1", UserId::new(3));
        // One matching reminder, one outside its window, one unknown code.
        item.reminders = vec![Reminder::unsent(3), Reminder::unsent(1), Reminder::unsent(42)];
        item.due_date = Some(NOW + 2 * DAY);
        let mut project = Project::new(ProjectId::new(1), "Website", "https://pm.example/website");
        project.insert_item(item);

        let store = store_with(vec![project], vec![alice()]);
        let mailer = Arc::new(TestMailer::default());

        batch(store.clone(), mailer).run_at(NOW).unwrap();

        let projects = store.projects.read().unwrap();
        let item = projects[0]
            .item(ItemKind::Task, &ItemId::from("t-1"))
            .unwrap();
        assert_eq!(item.reminders.len(), 3);
        assert!(item.reminders.iter().all(|r| r.sent));
    }
}
