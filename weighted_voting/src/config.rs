// ********* Input data structures ***********

use std::error::Error;
use std::fmt::Display;

/// The electoral rule applied when merging the per-group tallies of an event.
///
/// In most cases, it is enough to use the higher-level builder API.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum ElectoralRule {
    /// Winner-take-all: within each group, the choice with the most votes
    /// collects the whole weight of the group.
    Majority,
    /// The weight of each group is distributed across the choices in
    /// proportion to their share of the votes cast in that group.
    Proportional,
}

/// A voting member of an event.
///
/// Usernames are the identity of members and must be unique within an event.
/// The last name is only used to order listings (proxy candidates, holders).
#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub struct Member {
    pub username: String,
    pub last_name: String,
}

/// A weighted cohort of members.
///
/// The weights of all the groups of an event must sum to 100 before the
/// event can be started.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct GroupSetup {
    pub name: String,
    pub weight: u32,
    pub members: Vec<Member>,
}

/// A resolution submitted to the vote. Numbers are positive, unique within
/// an event and define the tabulation order.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct QuestionSetup {
    pub number: u32,
    pub text: String,
}

/// An answer option. Choices are defined once per event and shared by all
/// its questions. Numbers define the display and aggregation order.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ChoiceSetup {
    pub number: u32,
    pub text: String,
}

/// The full description of an event, before it is started.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct EventSetup {
    pub name: String,
    pub slug: String,
    pub rule: ElectoralRule,
    /// Attendance threshold, in percent of the members.
    pub quorum: u32,
    pub groups: Vec<GroupSetup>,
    pub questions: Vec<QuestionSetup>,
    pub choices: Vec<ChoiceSetup>,
}

impl EventSetup {
    pub const DEFAULT_QUORUM: u32 = 33;
}

// ******** Output data structures *********

/// The delegation situation of a member for an event. A member is always in
/// exactly one of these states.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum ProxyStatus {
    /// The member holds procurations from these members (ordered by last
    /// name).
    Holder(Vec<Member>),
    /// The member has given a procuration to this member and cannot vote.
    Delegated(Member),
    /// The member neither holds nor gave a procuration. Carries the members
    /// of the same group who could still receive one (ordered by last name).
    Free(Vec<Member>),
}

/// Voting bookkeeping for one member on one question.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct BallotStatus {
    /// Remaining vote allowance: the member's own vote plus one per
    /// procuration received, minus the ballots already cast. Zero for a
    /// member who delegated away.
    pub remaining_votes: u32,
    pub has_voted: bool,
    pub voted_on: Option<chrono::DateTime<chrono::Utc>>,
}

/// Aggregated outcome of one question: one entry per choice of the event,
/// in choice-number order.
///
/// Under [ElectoralRule::Majority] the values are accumulated group weights
/// (they sum to the total weight of the groups, not necessarily 100). Under
/// [ElectoralRule::Proportional] they are percentages rounded to 2 decimal
/// places, summing to 100 whenever at least one vote was cast.
#[derive(PartialEq, Debug, Clone)]
pub struct QuestionTally {
    pub question_no: u32,
    pub question_text: String,
    pub totals: Vec<(String, f64)>,
}

/// Labels and values of a question tally, ready for chart display.
#[derive(PartialEq, Debug, Clone)]
pub struct ChartData {
    pub labels: Vec<String>,
    pub values: Vec<f64>,
}

/// Raw votes of one group on one question, in choice-number order, with the
/// weight captured when the event started.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct GroupTally {
    pub group: String,
    pub votes: Vec<u64>,
    pub weight: u32,
}

/// A procuration edge, as recorded for an event.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ProcurationInfo {
    pub from: Member,
    pub to: Member,
    pub granted_on: chrono::DateTime<chrono::Utc>,
    pub confirmed: bool,
    pub confirmed_on: Option<chrono::DateTime<chrono::Utc>>,
}

/// Errors that prevent an event from being assembled or tabulated.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum VotingError {
    UnknownMember(String),
    UnknownQuestion(u32),
    UnknownChoice(u32),
    /// A member appears in more than one group of the event.
    MemberInSeveralGroups(String),
    DuplicateQuestionNumber(u32),
    DuplicateChoiceNumber(u32),
    /// Question numbers must be strictly positive.
    InvalidQuestionNumber(u32),
    /// A group weight is outside of the 0-100 range.
    InvalidGroupWeight { group: String, weight: u32 },
    /// The group weights of the event do not sum to 100.
    UnbalancedWeights { total: u32 },
    EventAlreadyStarted,
    EventNotStarted,
    SelfDelegation(String),
    /// The member already gave a procuration for this event.
    AlreadyDelegated(String),
    /// The requested proxy holder has himself delegated away.
    DelegateUnavailable(String),
    /// Procurations can only link members of a shared group.
    NoSharedGroup { from: String, to: String },
    /// No procuration edge between these two members.
    UnknownProcuration { from: String, to: String },
    /// The ballot spends more votes than the member has left.
    BallotExhausted {
        username: String,
        remaining: u32,
        requested: u32,
    },
    EmptyBallot,
}

impl Error for VotingError {}

impl Display for VotingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VotingError::UnknownMember(name) => write!(f, "unknown member: {}", name),
            VotingError::UnknownQuestion(no) => write!(f, "unknown question number: {}", no),
            VotingError::UnknownChoice(no) => write!(f, "unknown choice number: {}", no),
            VotingError::MemberInSeveralGroups(name) => {
                write!(f, "member {} belongs to several groups", name)
            }
            VotingError::DuplicateQuestionNumber(no) => {
                write!(f, "duplicate question number: {}", no)
            }
            VotingError::DuplicateChoiceNumber(no) => write!(f, "duplicate choice number: {}", no),
            VotingError::InvalidQuestionNumber(no) => {
                write!(f, "question numbers must be positive, got {}", no)
            }
            VotingError::InvalidGroupWeight { group, weight } => {
                write!(f, "group {} has weight {} outside of 0-100", group, weight)
            }
            VotingError::UnbalancedWeights { total } => {
                write!(f, "group weights sum to {} instead of 100", total)
            }
            VotingError::EventAlreadyStarted => write!(f, "the event has already been started"),
            VotingError::EventNotStarted => write!(f, "the event has not been started"),
            VotingError::SelfDelegation(name) => {
                write!(f, "member {} cannot delegate to himself", name)
            }
            VotingError::AlreadyDelegated(name) => {
                write!(f, "member {} already gave a procuration", name)
            }
            VotingError::DelegateUnavailable(name) => {
                write!(f, "member {} has delegated away and cannot be a proxy", name)
            }
            VotingError::NoSharedGroup { from, to } => {
                write!(f, "members {} and {} do not share a group", from, to)
            }
            VotingError::UnknownProcuration { from, to } => {
                write!(f, "no procuration from {} to {}", from, to)
            }
            VotingError::BallotExhausted {
                username,
                remaining,
                requested,
            } => write!(
                f,
                "member {} has {} votes left but the ballot spends {}",
                username, remaining, requested
            ),
            VotingError::EmptyBallot => write!(f, "a ballot must carry at least one choice"),
        }
    }
}
