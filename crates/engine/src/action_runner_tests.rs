// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use oja_core::ActionKind;

struct ImmediateSuccessRunner;

#[async_trait]
impl ActionRunner for ImmediateSuccessRunner {
    async fn start(
        &self,
        _action: &Action,
        _os_user: &str,
        _env: &HashMap<String, String>,
    ) -> Result<RunHandle, RunnerError> {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(RunOutcome { exit_code: Some(0), status: RunStatus::Succeeded });
        Ok(RunHandle { action_id: ActionId::new("a1"), outcome: rx })
    }

    async fn cancel(&self, _action_id: &ActionId, _grace: Duration) {}
}

#[tokio::test]
async fn handle_resolves_with_outcome() {
    let runner = ImmediateSuccessRunner;
    let action = Action::queued(ActionId::new("a1"), ActionKind::SyncInputJobAttachments);
    let mut handle = runner.start(&action, "job-user", &HashMap::new()).await.unwrap();
    let outcome = (&mut handle.outcome).await.unwrap();
    assert_eq!(outcome.status, RunStatus::Succeeded);
    assert_eq!(outcome.exit_code, Some(0));
}
