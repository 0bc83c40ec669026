use crate::infra::{build_screening_service, AppScreeningService};
use clap::{Args, ValueEnum};
use devscreen::config::ScreeningConfig;
use devscreen::error::AppError;
use devscreen::workflows::screening::{
    AnswerOutcome, AnswerSubmission, AnswerValue, Phase, Question, QuestionLookup, QuestionView,
    ScreeningResult, StartScreeningRequest,
};
use std::path::PathBuf;

/// How the scripted parent answers each question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub(crate) enum DemoProfile {
    /// Pick the least concerning option every time
    #[default]
    Typical,
    /// Pick the most concerning option every time
    Elevated,
}

#[derive(Args, Debug)]
pub(crate) struct DemoArgs {
    /// Child age in months (1-216)
    #[arg(long, default_value_t = 24)]
    pub(crate) age_months: i64,
    /// Answer pattern for the scripted parent
    #[arg(long, value_enum, default_value_t = DemoProfile::Typical)]
    pub(crate) profile: DemoProfile,
    /// Question bank JSON to use instead of the bundled one
    #[arg(long)]
    pub(crate) question_bank: Option<PathBuf>,
}

/// One question asked during the scripted run.
#[derive(Debug, Clone)]
pub(crate) struct DemoStep {
    pub(crate) phase: Phase,
    pub(crate) question: QuestionView,
    pub(crate) answer: AnswerValue,
    pub(crate) phase_message: Option<String>,
}

#[derive(Debug, Clone)]
pub(crate) struct DemoTranscript {
    pub(crate) age_group_label: &'static str,
    pub(crate) steps: Vec<DemoStep>,
    pub(crate) result: ScreeningResult,
}

const MAX_DEMO_QUESTIONS: usize = 100;

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let config = ScreeningConfig {
        question_bank: args.question_bank,
        ..ScreeningConfig::default()
    };
    let (service, _) = build_screening_service(&config)?;
    let transcript = script_screening(&service, args.age_months, args.profile)?;
    render_transcript(&transcript, args.age_months, args.profile);
    Ok(())
}

/// Drive one session from start to completion, answering per `profile`.
pub(crate) fn script_screening(
    service: &AppScreeningService,
    age_months: i64,
    profile: DemoProfile,
) -> Result<DemoTranscript, AppError> {
    let started = service.start_screening(StartScreeningRequest {
        child_age_months: Some(age_months),
        ..StartScreeningRequest::default()
    })?;

    let mut steps = Vec::new();
    let mut phase = started.phase;
    let mut phase_message = None;
    let mut next = started.initial_questions.into_iter().next();

    while let Some(question) = next.take() {
        if steps.len() >= MAX_DEMO_QUESTIONS {
            break;
        }
        let answer = choose_answer(service, &question, profile);
        steps.push(DemoStep {
            phase,
            question: question.clone(),
            answer: answer.clone(),
            phase_message: phase_message.take(),
        });

        let outcome = service.submit_answer(
            &started.session_id,
            AnswerSubmission {
                question_id: Some(question.id.0.clone()),
                answer: Some(answer),
            },
        )?;
        if let AnswerOutcome::InProgress(update) = outcome {
            phase = update.phase;
            phase_message = update.phase_message;
            next = Some(update.next_question);
        }
    }

    let result = service.get_result(&started.session_id)?;
    Ok(DemoTranscript {
        age_group_label: started.age_group_label,
        steps,
        result,
    })
}

fn choose_answer(
    service: &AppScreeningService,
    question: &QuestionView,
    profile: DemoProfile,
) -> AnswerValue {
    let fallback = AnswerValue::Text("yes".to_string());
    let Some(full) = service.catalog().resolve(&question.id) else {
        return fallback;
    };
    let candidates = answer_candidates(full);

    let mut best: Option<(u32, AnswerValue)> = None;
    for candidate in candidates {
        let points = full.contribution(&candidate);
        let better = match (&best, profile) {
            (None, _) => true,
            (Some((current, _)), DemoProfile::Elevated) => points > *current,
            (Some((current, _)), DemoProfile::Typical) => points < *current,
        };
        if better {
            best = Some((points, candidate));
        }
    }
    best.map(|(_, answer)| answer).unwrap_or(fallback)
}

fn answer_candidates(question: &Question) -> Vec<AnswerValue> {
    if question.options.is_empty() {
        return vec![
            AnswerValue::Text("yes".to_string()),
            AnswerValue::Text("no".to_string()),
        ];
    }
    question
        .options
        .iter()
        .map(|option| AnswerValue::Text(option.clone()))
        .collect()
}

fn render_transcript(transcript: &DemoTranscript, age_months: i64, profile: DemoProfile) {
    println!("Developmental screening demo");
    println!(
        "Child age: {age_months} months ({}), answer profile: {:?}",
        transcript.age_group_label, profile
    );

    let mut current_phase = None;
    for (index, step) in transcript.steps.iter().enumerate() {
        if current_phase != Some(step.phase) {
            println!("\n[{} phase]", step.phase.label());
            current_phase = Some(step.phase);
        }
        if let Some(message) = &step.phase_message {
            println!("  {message}");
        }
        println!(
            "  {:>2}. {} -> {}",
            index + 1,
            step.question.text,
            step.answer.key()
        );
    }

    let result = &transcript.result;
    println!("\nResult after {} answers", result.answered_count);
    println!("  Primary issue: {}", result.summary.primary_issue);
    if let Some(secondary) = result.secondary_concern {
        println!("  Secondary concern: {}", secondary.display_name());
    }
    for (concern, level) in &result.risk_levels {
        println!("  {}: {}", concern.display_name(), level.label());
    }
    println!(
        "  Overall risk: {:?}, urgency: {:?}, confidence: {:?}",
        result.overall_risk, result.urgency, result.confidence
    );

    print_section("Red flags", &result.red_flags);
    print_section("Positive indicators", &result.positive_indicators);
    print_section("Recommendations", &result.recommendations);
    print_section("Next steps", &result.next_steps);

    if !result.supplementary_conditions.is_empty() {
        println!("\nPattern matches");
        for condition in &result.supplementary_conditions {
            println!(
                "  - {} ({:.0}%)",
                condition.condition,
                condition.confidence * 100.0
            );
        }
    }
}

fn print_section(title: &str, lines: &[String]) {
    if lines.is_empty() {
        return;
    }
    println!("\n{title}");
    for line in lines {
        println!("  - {line}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use devscreen::workflows::screening::{Concern, RiskLevel};

    fn service() -> std::sync::Arc<AppScreeningService> {
        let (service, _) =
            build_screening_service(&ScreeningConfig::default()).expect("service builds");
        service
    }

    #[test]
    fn elevated_toddler_reaches_high_autism_risk() {
        let transcript =
            script_screening(&service(), 20, DemoProfile::Elevated).expect("demo completes");

        assert_eq!(
            transcript.result.risk_levels.get(&Concern::Autism),
            Some(&RiskLevel::High)
        );
        assert!(transcript
            .steps
            .iter()
            .any(|step| step.phase == Phase::Detailed));
        assert!(transcript
            .steps
            .iter()
            .any(|step| step.phase_message.is_some()));
    }

    #[test]
    fn typical_school_age_child_finishes_after_initial_questions() {
        let transcript =
            script_screening(&service(), 96, DemoProfile::Typical).expect("demo completes");

        assert!(!transcript.result.has_concern());
        assert!(transcript
            .steps
            .iter()
            .all(|step| step.phase == Phase::Initial));
        assert_eq!(transcript.age_group_label, "6y+");
    }

    #[test]
    fn elevated_school_age_child_reaches_performance_questions() {
        let transcript =
            script_screening(&service(), 96, DemoProfile::Elevated).expect("demo completes");

        assert!(transcript
            .steps
            .iter()
            .any(|step| step.phase == Phase::Performance));
        assert_eq!(
            transcript.result.primary_concern,
            Some(Concern::AdhdInattention)
        );
    }
}
