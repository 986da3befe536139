use serde_json::json;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    gateway::{self, Gateway, GatewayError, Query},
    models::{
        ConsultationParams, ConsultationRecord, ConsultationResult, MatchedProgram,
        NewConsultation, Program, ProgramMatch,
    },
};

use super::{Fetch, queries};

/// The one message shown whatever step of a consultation went wrong.
pub const FAILED: &str = "We couldn't complete your consultation. Please try again.";

#[derive(Debug, Error)]
#[error("We couldn't complete your consultation. Please try again.")]
pub struct ConsultationFailed {
    #[source]
    pub cause: GatewayError,
}

impl From<GatewayError> for ConsultationFailed {
    fn from(cause: GatewayError) -> Self {
        Self { cause }
    }
}

async fn matches(
    gateway: &dyn Gateway,
    params: &ConsultationParams,
) -> Result<Vec<ProgramMatch>, GatewayError> {
    let value = gateway.rpc("match_programs", serde_json::to_value(params)?).await?;
    if value.is_null() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_value(value)?)
}

/// Pairs every match with its program, keeping the backend's ranking. A match whose
/// program can't be loaded fails the whole result.
fn rank(scores: Vec<ProgramMatch>, programs: Vec<Program>) -> Result<Vec<MatchedProgram>, GatewayError> {
    scores
        .into_iter()
        .map(|scores| {
            let program = programs
                .iter()
                .find(|p| p.id == scores.program_id)
                .cloned()
                .ok_or_else(|| GatewayError::NotFound {
                    table: "programs".to_owned(),
                })?;
            Ok(MatchedProgram { program, scores })
        })
        .collect()
}

/// Loads the programs behind a ranking.
async fn complete(
    gateway: &dyn Gateway,
    record: ConsultationRecord,
    scores: Vec<ProgramMatch>,
) -> Result<ConsultationResult, GatewayError> {
    if scores.is_empty() {
        return Ok(ConsultationResult {
            record,
            matches: Vec::new(),
        });
    }

    let ids: Vec<Uuid> = scores.iter().map(|s| s.program_id).collect();
    let programs = queries::programs_by_id(&ids).fetch(gateway).await?;
    Ok(ConsultationResult {
        matches: rank(scores, programs)?,
        record,
    })
}

/// Saves the answers, asks the backend to score programs against them, stores the
/// ranking on the record and loads the programs it picked. Nothing partial comes back:
/// any failing step fails the lot.
pub async fn run(
    gateway: &dyn Gateway,
    user_id: Uuid,
    params: &ConsultationParams,
) -> Result<ConsultationResult, ConsultationFailed> {
    let attempt = async {
        let mut record: ConsultationRecord =
            gateway::insert(gateway, "consultations", &NewConsultation { user_id, params }).await?;
        let scores = matches(gateway, &record.params).await?;

        let saved = Query::table("consultations").eq("id", record.id.to_string());
        gateway::update(gateway, &saved, &json!({ "matches": scores })).await?;
        record.matches = Some(scores.clone());

        complete(gateway, record, scores).await
    };

    match attempt.await {
        Ok(result) => {
            info!(
                "consultation {} matched {} programs",
                result.record.id,
                result.matches.len()
            );
            Ok(result)
        }
        Err(err) => {
            warn!("consultation for {user_id} failed: {err}");
            Err(err.into())
        }
    }
}

/// Shows a saved consultation with the ranking it was given. Records saved before
/// rankings were stored are scored again. `Ok(None)` when it does not exist or belongs
/// to someone else.
pub async fn revisit(
    gateway: &dyn Gateway,
    user_id: Uuid,
    id: Uuid,
) -> Result<Option<ConsultationResult>, ConsultationFailed> {
    let record = queries::consultation(id).fetch(gateway).await?;
    let Some(record) = record.filter(|r| r.user_id == user_id) else {
        return Ok(None);
    };

    let attempt = async {
        let scores = match record.matches.clone() {
            Some(scores) => scores,
            None => matches(gateway, &record.params).await?,
        };
        complete(gateway, record, scores).await
    };
    match attempt.await {
        Ok(result) => Ok(Some(result)),
        Err(err) => {
            warn!("reloading consultation {id} failed: {err}");
            Err(err.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use crate::{gateway::MemoryGateway, models::StudyLevel};

    use super::*;

    fn params() -> ConsultationParams {
        ConsultationParams {
            budget_min: 10000.0,
            budget_max: 30000.0,
            language: "English".to_owned(),
            level: StudyLevel::Master,
            country: "uk".to_owned(),
            duration_months: Some(12),
            field: "Computing".to_owned(),
            needs_scholarship: false,
            halal_food: true,
            prayer_facilities: false,
            international_community: true,
        }
    }

    fn program(id: Uuid, name: &str) -> Value {
        json!({
            "id": id, "name": name, "university": "Leeds", "country": "uk", "level": "master"
        })
    }

    fn backend() -> (MemoryGateway, Uuid, Uuid) {
        let gateway = MemoryGateway::new();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        gateway.seed(
            "programs",
            [program(first, "MSc Data Science"), program(second, "MSc AI")],
        );
        gateway.register("match_programs", move |_, args| {
            assert_eq!(args["country"], "uk");
            Ok(json!([
                { "program_id": second, "total_score": 91.5, "budget_score": 20 },
                { "program_id": first, "total_score": 74.0 },
            ]))
        });
        (gateway, first, second)
    }

    #[tokio::test]
    async fn results_keep_backend_ranking() {
        let (gateway, first, second) = backend();
        let user = Uuid::new_v4();

        let result = run(&gateway, user, &params()).await.unwrap();

        let ranked: Vec<Uuid> = result.matches.iter().map(|m| m.program.id).collect();
        assert_eq!(ranked, [second, first]);
        assert_eq!(result.matches[0].scores.budget_score, 20.0);
        assert_eq!(result.record.user_id, user);
        assert_eq!(gateway.rows("consultations").len(), 1);
        assert_eq!(gateway.rows("consultations")[0]["halal_food"], true);
    }

    #[tokio::test]
    async fn every_failing_step_gives_the_same_error() {
        for target in ["consultations", "rpc:match_programs", "programs"] {
            let (gateway, _, _) = backend();
            gateway.fail(target, "boom");

            let err = run(&gateway, Uuid::new_v4(), &params()).await.unwrap_err();
            assert_eq!(err.to_string(), FAILED, "failing {target}");
            assert_eq!(err.cause.to_string(), "boom");
        }
    }

    #[tokio::test]
    async fn no_matches_is_a_result() {
        let gateway = MemoryGateway::new();
        gateway.register("match_programs", |_, _| Ok(json!([])));

        let result = run(&gateway, Uuid::new_v4(), &params()).await.unwrap();
        assert!(result.matches.is_empty());
    }

    #[tokio::test]
    async fn revisit_hides_other_users_consultations() {
        let (gateway, _, _) = backend();
        let owner = Uuid::new_v4();
        let saved = run(&gateway, owner, &params()).await.unwrap();

        let again = revisit(&gateway, owner, saved.record.id).await.unwrap().unwrap();
        assert_eq!(again.matches.len(), 2);
        assert!(revisit(&gateway, Uuid::new_v4(), saved.record.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unknown_matched_program_fails_the_lot() {
        let (gateway, first, _) = backend();
        gateway.register("match_programs", move |_, _| {
            Ok(json!([
                { "program_id": first, "total_score": 80.0 },
                { "program_id": Uuid::new_v4(), "total_score": 60.0 },
            ]))
        });

        let err = run(&gateway, Uuid::new_v4(), &params()).await.unwrap_err();
        assert_eq!(err.to_string(), FAILED);
        assert!(err.cause.is_not_found());
    }

    #[tokio::test]
    async fn revisit_keeps_the_stored_ranking() {
        let (gateway, first, second) = backend();
        let owner = Uuid::new_v4();
        let saved = run(&gateway, owner, &params()).await.unwrap();
        assert_eq!(gateway.rows("consultations")[0]["matches"][0]["program_id"], second.to_string());

        // the backend would now rank differently, or not at all
        gateway.fail("rpc:match_programs", "gone");
        let again = revisit(&gateway, owner, saved.record.id).await.unwrap().unwrap();

        let ranked: Vec<Uuid> = again.matches.iter().map(|m| m.program.id).collect();
        assert_eq!(ranked, [second, first]);
    }
}
