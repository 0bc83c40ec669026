use super::super::progression::{ADHD_MIN_AGE_MONTHS, AUTISM_MAX_AGE_MONTHS};
use super::super::scoring::ScoreSnapshot;
use super::{Concern, Confidence, RiskLevel, Urgency};

pub(crate) const ADHD_HIGH_RISK_COUNT: u32 = 6;
pub(crate) const SPEECH_SIGNIFICANT_TOTAL: u32 = 9;
pub(crate) const SPEECH_MODERATE_TOTAL: u32 = 4;

const LOW_CONFIDENCE_BELOW: usize = 10;
const HIGH_CONFIDENCE_FROM: usize = 15;

/// A concern that passed its clinical threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Finding {
    pub concern: Concern,
    pub risk: RiskLevel,
}

/// Ordered, non-exclusive concern rules: autism, inattention, hyperactivity, speech.
pub(crate) fn evaluate_findings(
    age_months: u16,
    scores: &ScoreSnapshot,
    performance_impact: bool,
) -> Vec<Finding> {
    let mut findings = Vec::new();

    if let Some(risk) = autism_risk(age_months, scores) {
        findings.push(Finding {
            concern: Concern::Autism,
            risk,
        });
    }

    if age_months >= ADHD_MIN_AGE_MONTHS && performance_impact {
        if scores.adhd.inattention_count >= ADHD_HIGH_RISK_COUNT {
            findings.push(Finding {
                concern: Concern::AdhdInattention,
                risk: RiskLevel::High,
            });
        }
        if scores.adhd.hyperactive_count >= ADHD_HIGH_RISK_COUNT {
            findings.push(Finding {
                concern: Concern::AdhdHyperactive,
                risk: RiskLevel::High,
            });
        }
    }

    if let Some(risk) = speech_risk(scores) {
        findings.push(Finding {
            concern: Concern::SpeechDelay,
            risk,
        });
    }

    findings
}

fn autism_risk(age_months: u16, scores: &ScoreSnapshot) -> Option<RiskLevel> {
    if age_months > AUTISM_MAX_AGE_MONTHS {
        return None;
    }

    let autism = scores.autism;
    if autism.critical_count >= 3 {
        Some(RiskLevel::High)
    } else if autism.critical_count >= 2 && autism.total >= 8 {
        Some(RiskLevel::Medium)
    } else if autism.total >= 6 {
        Some(RiskLevel::Low)
    } else {
        None
    }
}

fn speech_risk(scores: &ScoreSnapshot) -> Option<RiskLevel> {
    if scores.speech.total >= SPEECH_SIGNIFICANT_TOTAL {
        Some(RiskLevel::Significant)
    } else if scores.speech.total >= SPEECH_MODERATE_TOTAL {
        Some(RiskLevel::Moderate)
    } else {
        None
    }
}

/// Fixed recommendation and next-step text attached to a finding.
pub(crate) struct Guidance {
    pub recommendations: &'static [&'static str],
    pub next_steps: &'static [&'static str],
}

pub(crate) fn guidance(finding: Finding) -> Guidance {
    match (finding.concern, finding.risk) {
        (Concern::Autism, RiskLevel::High) => Guidance {
            recommendations: &[
                "Arrange an immediate evaluation with an autism specialist",
                "Schedule with developmental pediatrician for a comprehensive assessment",
                "Begin early intervention services",
            ],
            next_steps: &[
                "Urgent referral to autism specialist",
                "Comprehensive developmental evaluation",
            ],
        },
        (Concern::Autism, RiskLevel::Medium) => Guidance {
            recommendations: &[
                "Consult a developmental pediatrician",
                "Consider a structured autism assessment such as ADOS-2",
            ],
            next_steps: &[
                "Comprehensive developmental evaluation",
                "Monitor language and social development",
            ],
        },
        (Concern::Autism, _) => Guidance {
            recommendations: &[
                "Monitor social communication development closely",
                "Re-screen in 3-6 months",
            ],
            next_steps: &["Monitor language and social development"],
        },
        (Concern::AdhdInattention, _) => Guidance {
            recommendations: &[
                "Consult a child psychiatrist or neuropsychologist for an ADHD evaluation",
                "Establish clear routines and break tasks into small steps",
            ],
            next_steps: &[
                "Neuropsychological assessment",
                "School performance evaluation",
            ],
        },
        (Concern::AdhdHyperactive, _) => Guidance {
            recommendations: &[
                "Consult a child psychiatrist or neuropsychologist for an ADHD evaluation",
                "Provide a structured environment with regular physical activity",
            ],
            next_steps: &[
                "Monitor behavior at school and home",
                "Classroom observation if available",
            ],
        },
        (Concern::SpeechDelay, RiskLevel::Significant) => Guidance {
            recommendations: &[
                "Refer to a speech-language pathologist for a full evaluation",
                "Read to the child daily and narrate everyday activities",
            ],
            next_steps: &[
                "Speech and language evaluation",
                "Hearing assessment to rule out hearing loss",
            ],
        },
        (Concern::SpeechDelay, _) => Guidance {
            recommendations: &[
                "Read to the child daily and narrate everyday activities",
                "Encourage verbal communication during play",
            ],
            next_steps: &["Speech and language evaluation if concerns persist"],
        },
    }
}

pub(crate) const TYPICAL_RECOMMENDATION: &str =
    "No strong indicators currently detected, routine follow-up recommended";
pub(crate) const TYPICAL_NEXT_STEP: &str = "Continue routine developmental monitoring";

/// Confidence follows the most severe recorded risk, not only the primary one.
pub(crate) fn confidence(findings: &[Finding], answered: usize) -> Confidence {
    let Some(highest) = findings.iter().map(|finding| finding.risk.severity()).max() else {
        return Confidence::High;
    };

    if answered < LOW_CONFIDENCE_BELOW {
        Confidence::Low
    } else if highest >= 3 && answered >= HIGH_CONFIDENCE_FROM {
        Confidence::High
    } else {
        Confidence::Medium
    }
}

/// Urgency follows the most severe recorded risk.
pub(crate) fn urgency(findings: &[Finding]) -> Urgency {
    match findings.iter().map(|finding| finding.risk.severity()).max() {
        Some(3) => Urgency::Urgent,
        Some(2) => Urgency::Soon,
        _ => Urgency::Routine,
    }
}

pub(crate) fn urgency_step(urgency: Urgency) -> Option<&'static str> {
    match urgency {
        Urgency::Urgent => Some("URGENT: Immediate evaluation recommended within 1-2 weeks"),
        Urgency::Soon => Some("Schedule a specialist evaluation within the next 1-3 months"),
        Urgency::Routine => None,
    }
}
