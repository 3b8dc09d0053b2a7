// The analytics report, in JSON format.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Map as JSMap;
use text_diff::print_diff;

use crate::ballotbox::*;

pub fn post_result_to_json(r: &PostResult) -> JSValue {
    let candidates: Vec<JSValue> = r
        .candidates
        .iter()
        .map(|cr| {
            json!({
                "id": cr.candidate.id.0,
                "name": cr.candidate.name,
                "slogan": cr.candidate.slogan,
                "votes": cr.votes.0,
            })
        })
        .collect();
    let leader = r.leading_candidate.as_ref().map(|c| {
        json!({
            "id": c.id.0,
            "name": c.name,
        })
    });
    json!({
        "post": {
            "id": r.post.id.0,
            "title": r.post.title,
            "description": r.post.description,
        },
        "candidates": candidates,
        "totalVotes": r.total_votes.0,
        "leadingCandidate": leader,
        "leadingVotes": r.leading_votes.0,
        "margin": margin(r),
    })
}

fn position_performance(r: &PostResult, total_voters: usize) -> JSValue {
    let candidates: Vec<JSValue> = r
        .candidates
        .iter()
        .map(|cr| {
            json!({
                "name": cr.candidate.name,
                "votes": cr.votes.0,
                "percentage": vote_share(cr.votes, r.total_votes),
            })
        })
        .collect();
    json!({
        "position": r.post.title,
        "totalVotes": r.total_votes.0,
        "participationRate": participation_rate(r, total_voters),
        "candidates": candidates,
    })
}

pub fn build_report(
    store: &ElectionStore,
    rules: &ElectionRules,
    generated_at: DateTime<Utc>,
) -> JSValue {
    let aggregator = ResultsAggregator::new(store, rules);
    let results = aggregator.compute_results();
    let summary = aggregator.summary(&results);
    let total_voters = store.voters().len();

    let rankings: Vec<JSValue> = candidate_rankings(&results, Some(10))
        .iter()
        .map(|cr| {
            json!({
                "rank": cr.rank,
                "name": cr.candidate.name,
                "position": cr.position,
                "votes": cr.votes.0,
                "percentage": cr.share,
            })
        })
        .collect();
    let insights: Vec<JSValue> = aggregator
        .insights(&results)
        .iter()
        .map(|i| json!({"title": i.title(), "description": i.to_string()}))
        .collect();

    json!({
        "generatedAt": generated_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        "summary": {
            "totalVotes": summary.total_votes.0,
            "voterTurnout": summary.voter_turnout,
            "activePositions": summary.active_positions,
            "totalCandidates": summary.total_candidates,
            "votedStudents": summary.voted_students,
            "registeredVoters": summary.registered_voters,
        },
        "results": results.iter().map(post_result_to_json).collect::<Vec<JSValue>>(),
        "detailedAnalysis": {
            "positionPerformance": results
                .iter()
                .map(|r| position_performance(r, total_voters))
                .collect::<Vec<JSValue>>(),
            "candidateRankings": rankings,
            "insights": insights,
        },
    })
}

fn without_timestamp(js: &JSValue) -> JSValue {
    match js {
        JSValue::Object(m) => {
            let filtered: JSMap<String, JSValue> = m
                .iter()
                .filter(|(k, _)| k.as_str() != "generatedAt")
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            JSValue::Object(filtered)
        }
        x => x.clone(),
    }
}

/// Checks a report against a reference report. The generation time is not
/// compared.
pub fn compare_with_reference(report: &JSValue, reference_path: &str) -> BallotBoxResult<()> {
    let contents = fs::read_to_string(reference_path).context(ReadingFileSnafu {
        path: reference_path.to_string(),
    })?;
    let reference: JSValue = serde_json::from_str(&contents).context(ParsingJsonSnafu {
        path: reference_path.to_string(),
    })?;
    let pretty_ref =
        serde_json::to_string_pretty(&without_timestamp(&reference)).context(SerializingJsonSnafu {})?;
    let pretty_ours =
        serde_json::to_string_pretty(&without_timestamp(report)).context(SerializingJsonSnafu {})?;
    if pretty_ref != pretty_ours {
        warn!("Found differences with the reference report");
        print_diff(pretty_ref.as_str(), pretty_ours.as_str(), "\n");
        return ReferenceMismatchSnafu {
            path: reference_path.to_string(),
        }
        .fail();
    }
    info!("compare_with_reference: report matches {}", reference_path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_store() -> ElectionStore {
        let mut store = ElectionStore::default();
        let p = store.add_post("President", "").unwrap();
        let a = store.add_candidate(&p.id, CandidateProfile::named("A")).unwrap();
        store.add_candidate(&p.id, CandidateProfile::named("B")).unwrap();
        let mut voters = Vec::new();
        for code in ["S1", "S2", "S3", "S4"] {
            voters.push(
                store
                    .add_voter(VoterRegistration {
                        name: code.to_string(),
                        student_code: code.to_string(),
                        password: "pw".to_string(),
                    })
                    .unwrap(),
            );
        }
        let ballot: Ballot = [(p.id.clone(), a.id.clone())].into_iter().collect();
        let rules = ElectionRules::DEFAULT_RULES;
        let mut ledger = Ledger::new(&mut store, &rules);
        for v in voters.iter().take(3) {
            ledger.submit_ballot(&v.id, &ballot).unwrap();
        }
        store
    }

    fn temp_path(name: &str) -> String {
        let mut p = std::env::temp_dir();
        p.push(format!("ballotbox-report-{}-{}.json", name, std::process::id()));
        p.display().to_string()
    }

    #[test]
    fn report_layout() {
        let store = sample_store();
        let at = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
        let js = build_report(&store, &ElectionRules::DEFAULT_RULES, at);
        assert_eq!(js["generatedAt"], json!("2023-11-14T22:13:20.000Z"));
        assert_eq!(js["summary"]["totalVotes"], json!(3));
        assert_eq!(js["summary"]["voterTurnout"], json!(75));
        assert_eq!(js["summary"]["registeredVoters"], json!(4));
        assert_eq!(js["results"][0]["leadingCandidate"]["name"], json!("A"));
        assert_eq!(js["results"][0]["margin"], json!(3));
        let perf = &js["detailedAnalysis"]["positionPerformance"][0];
        assert_eq!(perf["position"], json!("President"));
        assert_eq!(perf["participationRate"], json!(75));
        assert_eq!(perf["candidates"][0]["percentage"], json!(100));
        assert_eq!(perf["candidates"][1]["percentage"], json!(0));
        assert_eq!(
            js["detailedAnalysis"]["candidateRankings"][1]["rank"],
            json!(2)
        );
        assert_eq!(
            js["detailedAnalysis"]["insights"][0]["title"],
            json!("Moderate Participation")
        );
    }

    #[test]
    fn reference_ignores_generation_time() {
        let store = sample_store();
        let rules = ElectionRules::DEFAULT_RULES;
        let earlier = build_report(&store, &rules, Utc.timestamp_millis_opt(1_600_000_000_000).unwrap());
        let path = temp_path("match");
        fs::write(&path, serde_json::to_string_pretty(&earlier).unwrap()).unwrap();

        let now = build_report(&store, &rules, Utc::now());
        assert!(compare_with_reference(&now, &path).is_ok());

        let empty = build_report(&ElectionStore::default(), &rules, Utc::now());
        assert!(matches!(
            compare_with_reference(&empty, &path),
            Err(BallotBoxError::ReferenceMismatch { .. })
        ));
        let _ = fs::remove_file(&path);
    }
}
