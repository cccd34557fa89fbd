mod config;
pub mod builder;
pub mod manual;

use log::{debug, info};

use std::collections::HashMap;

use chrono::{DateTime, Utc};

pub use crate::config::*;

// **** Private structures ****

#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
struct MemberId(u32);

#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
struct GroupId(u32);

#[derive(Eq, PartialEq, Debug, Clone)]
struct MemberInternal {
    username: String,
    last_name: String,
    group: GroupId,
}

#[derive(Eq, PartialEq, Debug, Clone)]
struct GroupInternal {
    name: String,
    weight: u32,
}

// A directed procuration edge. The delegating member is the key of the map
// holding this value, which enforces at most one outgoing edge per member.
#[derive(Eq, PartialEq, Debug, Clone)]
struct ProcurationInternal {
    holder: MemberId,
    granted_on: DateTime<Utc>,
    confirmed: bool,
    confirmed_on: Option<DateTime<Utc>>,
}

// One tally bucket per (group, question, choice), created zeroed when the
// event starts. The group weight is captured at start time: editing a group
// after the event started must not change an open ballot.
#[derive(Eq, PartialEq, Debug, Clone)]
struct TallyCell {
    votes: u64,
    group_weight: u32,
}

/// The live state of an event: members grouped in weighted cohorts, ordered
/// questions, shared choices, procuration edges and, once started, the
/// per-member vote allowances and per-group tallies.
///
/// An event is built inert. [EventState::start] transitions it exactly once
/// to the started state, after which procurations are frozen and ballots can
/// be cast.
#[derive(Debug, Clone)]
pub struct EventState {
    name: String,
    slug: String,
    rule: ElectoralRule,
    quorum: u32,
    started: bool,
    members: Vec<MemberInternal>,
    by_username: HashMap<String, MemberId>,
    groups: Vec<GroupInternal>,
    // Sorted by number at construction.
    questions: Vec<QuestionSetup>,
    choices: Vec<ChoiceSetup>,
    procurations: HashMap<MemberId, ProcurationInternal>,
    // Keyed by (member, question index). Empty until the event starts.
    ballots: HashMap<(MemberId, usize), BallotStatus>,
    tallies: HashMap<(GroupId, usize, usize), TallyCell>,
}

impl EventState {
    /// Assembles an event from its setup.
    ///
    /// Checks the structural invariants: unique positive question numbers,
    /// unique choice numbers, group weights within 0-100 and every member in
    /// exactly one group. The weight-sum-100 invariant is only enforced by
    /// [EventState::start], so that groups can be staged incrementally.
    pub fn new(setup: &EventSetup) -> Result<EventState, VotingError> {
        let mut questions = setup.questions.clone();
        questions.sort_by_key(|q| q.number);
        for q in questions.iter() {
            if q.number == 0 {
                return Err(VotingError::InvalidQuestionNumber(q.number));
            }
        }
        for w in questions.windows(2) {
            if w[0].number == w[1].number {
                return Err(VotingError::DuplicateQuestionNumber(w[0].number));
            }
        }

        let mut choices = setup.choices.clone();
        choices.sort_by_key(|c| c.number);
        for w in choices.windows(2) {
            if w[0].number == w[1].number {
                return Err(VotingError::DuplicateChoiceNumber(w[0].number));
            }
        }

        let mut groups: Vec<GroupInternal> = Vec::new();
        let mut members: Vec<MemberInternal> = Vec::new();
        let mut by_username: HashMap<String, MemberId> = HashMap::new();
        for (gidx, group) in setup.groups.iter().enumerate() {
            if group.weight > 100 {
                return Err(VotingError::InvalidGroupWeight {
                    group: group.name.clone(),
                    weight: group.weight,
                });
            }
            let gid = GroupId(gidx as u32);
            groups.push(GroupInternal {
                name: group.name.clone(),
                weight: group.weight,
            });
            for member in group.members.iter() {
                if by_username.contains_key(&member.username) {
                    return Err(VotingError::MemberInSeveralGroups(member.username.clone()));
                }
                let mid = MemberId(members.len() as u32);
                by_username.insert(member.username.clone(), mid);
                members.push(MemberInternal {
                    username: member.username.clone(),
                    last_name: member.last_name.clone(),
                    group: gid,
                });
            }
        }

        info!(
            "EventState::new: event {:?}: {} groups, {} members, {} questions, {} choices, rule {:?}",
            setup.slug,
            groups.len(),
            members.len(),
            questions.len(),
            choices.len(),
            setup.rule
        );

        Ok(EventState {
            name: setup.name.clone(),
            slug: setup.slug.clone(),
            rule: setup.rule,
            quorum: setup.quorum,
            started: false,
            members,
            by_username,
            groups,
            questions,
            choices,
            procurations: HashMap::new(),
            ballots: HashMap::new(),
            tallies: HashMap::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn slug(&self) -> &str {
        &self.slug
    }

    pub fn rule(&self) -> ElectoralRule {
        self.rule
    }

    pub fn quorum(&self) -> u32 {
        self.quorum
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn questions(&self) -> &[QuestionSetup] {
        &self.questions
    }

    pub fn choices(&self) -> &[ChoiceSetup] {
        &self.choices
    }

    fn member_id(&self, username: &str) -> Result<MemberId, VotingError> {
        self.by_username
            .get(username)
            .copied()
            .ok_or_else(|| VotingError::UnknownMember(username.to_string()))
    }

    fn member(&self, mid: MemberId) -> &MemberInternal {
        &self.members[mid.0 as usize]
    }

    fn question_index(&self, question_no: u32) -> Result<usize, VotingError> {
        self.questions
            .iter()
            .position(|q| q.number == question_no)
            .ok_or(VotingError::UnknownQuestion(question_no))
    }

    fn public_member(&self, mid: MemberId) -> Member {
        let m = self.member(mid);
        Member {
            username: m.username.clone(),
            last_name: m.last_name.clone(),
        }
    }

    // ***** Procuration resolver *****

    /// Records a procuration: `from` hands his vote to `to` for this event.
    ///
    /// Both members must share a group. A member can delegate at most once,
    /// and cannot delegate to a member who has himself delegated away (this
    /// also rules out delegation cycles). Procurations are frozen once the
    /// event starts, since the vote allowances are computed at start time.
    pub fn delegate(&mut self, from: &str, to: &str) -> Result<(), VotingError> {
        if self.started {
            return Err(VotingError::EventAlreadyStarted);
        }
        if from == to {
            return Err(VotingError::SelfDelegation(from.to_string()));
        }
        let from_id = self.member_id(from)?;
        let to_id = self.member_id(to)?;
        if self.procurations.contains_key(&from_id) {
            return Err(VotingError::AlreadyDelegated(from.to_string()));
        }
        if self.procurations.contains_key(&to_id) {
            return Err(VotingError::DelegateUnavailable(to.to_string()));
        }
        if self.member(from_id).group != self.member(to_id).group {
            return Err(VotingError::NoSharedGroup {
                from: from.to_string(),
                to: to.to_string(),
            });
        }
        debug!("delegate: {} -> {} for event {}", from, to, self.slug);
        self.procurations.insert(
            from_id,
            ProcurationInternal {
                holder: to_id,
                granted_on: Utc::now(),
                confirmed: false,
                confirmed_on: None,
            },
        );
        Ok(())
    }

    /// Formal acceptance of a procuration by its holder. Idempotent: a
    /// procuration that is already confirmed keeps its confirmation date.
    pub fn confirm_procuration(&mut self, holder: &str, from: &str) -> Result<(), VotingError> {
        let from_id = self.member_id(from)?;
        let holder_id = self.member_id(holder)?;
        let proc = self
            .procurations
            .get_mut(&from_id)
            .filter(|p| p.holder == holder_id)
            .ok_or(VotingError::UnknownProcuration {
                from: from.to_string(),
                to: holder.to_string(),
            })?;
        if !proc.confirmed {
            proc.confirmed = true;
            proc.confirmed_on = Some(Utc::now());
        }
        Ok(())
    }

    /// A member takes his procuration back.
    pub fn cancel_procuration(&mut self, from: &str) -> Result<(), VotingError> {
        if self.started {
            return Err(VotingError::EventAlreadyStarted);
        }
        let from_id = self.member_id(from)?;
        let holder = self
            .procurations
            .remove(&from_id)
            .ok_or(VotingError::UnknownProcuration {
                from: from.to_string(),
                to: "?".to_string(),
            })?;
        debug!(
            "cancel_procuration: removed {} -> {:?}",
            from, holder.holder
        );
        Ok(())
    }

    /// The requested holder turns down a procuration.
    pub fn refuse_procuration(&mut self, holder: &str, from: &str) -> Result<(), VotingError> {
        if self.started {
            return Err(VotingError::EventAlreadyStarted);
        }
        let from_id = self.member_id(from)?;
        let holder_id = self.member_id(holder)?;
        match self.procurations.get(&from_id) {
            Some(p) if p.holder == holder_id => {
                self.procurations.remove(&from_id);
                Ok(())
            }
            _ => Err(VotingError::UnknownProcuration {
                from: from.to_string(),
                to: holder.to_string(),
            }),
        }
    }

    /// Classifies a member into exactly one delegation state for this event.
    ///
    /// Read-only: holders get the list of delegating members, delegators get
    /// their holder, free members get the same-group members who could still
    /// receive their procuration (excluding themselves and anyone who already
    /// delegated in this event). All listings are ordered by last name.
    pub fn proxy_status(&self, username: &str) -> Result<ProxyStatus, VotingError> {
        let mid = self.member_id(username)?;

        let mut delegators: Vec<Member> = self
            .procurations
            .iter()
            .filter(|(_, p)| p.holder == mid)
            .map(|(from, _)| self.public_member(*from))
            .collect();
        if !delegators.is_empty() {
            delegators.sort_by(|a, b| (&a.last_name, &a.username).cmp(&(&b.last_name, &b.username)));
            return Ok(ProxyStatus::Holder(delegators));
        }

        if let Some(proc) = self.procurations.get(&mid) {
            return Ok(ProxyStatus::Delegated(self.public_member(proc.holder)));
        }

        let group = self.member(mid).group;
        let mut candidates: Vec<Member> = self
            .members
            .iter()
            .enumerate()
            .filter(|(idx, m)| {
                let other = MemberId(*idx as u32);
                other != mid && m.group == group && !self.procurations.contains_key(&other)
            })
            .map(|(_, m)| Member {
                username: m.username.clone(),
                last_name: m.last_name.clone(),
            })
            .collect();
        candidates.sort_by(|a, b| (&a.last_name, &a.username).cmp(&(&b.last_name, &b.username)));
        Ok(ProxyStatus::Free(candidates))
    }

    // ***** Ballot allowance engine *****

    /// Starts the event: freezes procurations, computes every member's vote
    /// allowance for every question and creates the zeroed tally buckets for
    /// every (group, question, choice) combination.
    ///
    /// Gated by the weight invariant: the group weights must sum to exactly
    /// 100. A started event never reverts.
    pub fn start(&mut self) -> Result<(), VotingError> {
        if self.started {
            return Err(VotingError::EventAlreadyStarted);
        }
        let total: u32 = self.groups.iter().map(|g| g.weight).sum();
        if total != 100 {
            return Err(VotingError::UnbalancedWeights { total });
        }

        let mut incoming: HashMap<MemberId, u32> = HashMap::new();
        for proc in self.procurations.values() {
            *incoming.entry(proc.holder).or_insert(0) += 1;
        }

        for qidx in 0..self.questions.len() {
            for (midx, _) in self.members.iter().enumerate() {
                let mid = MemberId(midx as u32);
                let allowance = if self.procurations.contains_key(&mid) {
                    0
                } else {
                    1 + incoming.get(&mid).copied().unwrap_or(0)
                };
                self.ballots.insert(
                    (mid, qidx),
                    BallotStatus {
                        remaining_votes: allowance,
                        has_voted: false,
                        voted_on: None,
                    },
                );
            }
            for (gidx, group) in self.groups.iter().enumerate() {
                for cidx in 0..self.choices.len() {
                    self.tallies.insert(
                        (GroupId(gidx as u32), qidx, cidx),
                        TallyCell {
                            votes: 0,
                            group_weight: group.weight,
                        },
                    );
                }
            }
        }

        self.started = true;
        info!(
            "start: event {} started with {} procurations",
            self.slug,
            self.procurations.len()
        );
        Ok(())
    }

    /// The vote status of a member on a question.
    pub fn ballot_status(
        &self,
        username: &str,
        question_no: u32,
    ) -> Result<&BallotStatus, VotingError> {
        if !self.started {
            return Err(VotingError::EventNotStarted);
        }
        let mid = self.member_id(username)?;
        let qidx = self.question_index(question_no)?;
        // Every (member, question) pair has a row once the event started.
        Ok(&self.ballots[&(mid, qidx)])
    }

    /// Casts a ballot: spends one allowance per submitted choice, marks the
    /// member as having voted with a timestamp, and increments the tally
    /// buckets of the member's group.
    ///
    /// A holder voting several allowances at once submits several choices
    /// (possibly repeating the same one). Over-spending is rejected, so the
    /// allowance can never go negative.
    pub fn cast_ballot(
        &mut self,
        username: &str,
        question_no: u32,
        choice_nos: &[u32],
    ) -> Result<&BallotStatus, VotingError> {
        if !self.started {
            return Err(VotingError::EventNotStarted);
        }
        if choice_nos.is_empty() {
            return Err(VotingError::EmptyBallot);
        }
        let mid = self.member_id(username)?;
        let qidx = self.question_index(question_no)?;
        let mut choice_idxs: Vec<usize> = Vec::new();
        for no in choice_nos {
            let cidx = self
                .choices
                .iter()
                .position(|c| c.number == *no)
                .ok_or(VotingError::UnknownChoice(*no))?;
            choice_idxs.push(cidx);
        }

        let requested = choice_nos.len() as u32;
        let status = self.ballots.get_mut(&(mid, qidx)).unwrap();
        if status.remaining_votes < requested {
            return Err(VotingError::BallotExhausted {
                username: username.to_string(),
                remaining: status.remaining_votes,
                requested,
            });
        }
        status.remaining_votes -= requested;
        status.has_voted = true;
        status.voted_on = Some(Utc::now());

        let group = self.members[mid.0 as usize].group;
        for cidx in choice_idxs {
            let cell = self.tallies.get_mut(&(group, qidx, cidx)).unwrap();
            cell.votes += 1;
        }
        debug!(
            "cast_ballot: {} voted {:?} on question {} of {}",
            username, choice_nos, question_no, self.slug
        );
        Ok(&self.ballots[&(mid, qidx)])
    }

    // ***** Aggregation engine *****

    /// Aggregates the per-group tallies of a question into a global result
    /// under the event's electoral rule.
    ///
    /// Majority: within each group, the choice with the highest count takes
    /// the whole group weight; ties resolve to the first maximal choice in
    /// choice-number order. A group with no vote at all therefore awards its
    /// weight to its first choice.
    ///
    /// Proportional: each choice collects `votes * weight / 100` from every
    /// group; the totals are then renormalized to percentages (2 decimal
    /// places, half-even) whenever the total contribution is positive.
    pub fn results(&self, question_no: u32) -> Result<QuestionTally, VotingError> {
        if !self.started {
            return Err(VotingError::EventNotStarted);
        }
        let qidx = self.question_index(question_no)?;
        if self.choices.is_empty() {
            return Ok(QuestionTally {
                question_no,
                question_text: self.questions[qidx].text.clone(),
                totals: Vec::new(),
            });
        }

        let mut totals: Vec<f64> = vec![0.0; self.choices.len()];
        for (gidx, _) in self.groups.iter().enumerate() {
            let gid = GroupId(gidx as u32);
            let values: Vec<u64> = (0..self.choices.len())
                .map(|cidx| self.tallies[&(gid, qidx, cidx)].votes)
                .collect();
            // The weight captured when the event started, not the live one.
            let weight = self.tallies[&(gid, qidx, 0)].group_weight;
            match self.rule {
                ElectoralRule::Majority => {
                    let max_votes = *values.iter().max().unwrap();
                    let top = values.iter().position(|v| *v == max_votes).unwrap();
                    totals[top] += weight as f64;
                }
                ElectoralRule::Proportional => {
                    for (cidx, votes) in values.iter().enumerate() {
                        totals[cidx] += *votes as f64 * weight as f64 / 100.0;
                    }
                }
            }
        }

        if self.rule == ElectoralRule::Proportional {
            let total: f64 = totals.iter().sum();
            if total > 0.0 {
                for value in totals.iter_mut() {
                    *value = round_half_even2(*value / total * 100.0);
                }
            }
        }

        debug!(
            "results: question {} of {}: {:?}",
            question_no, self.slug, totals
        );
        Ok(QuestionTally {
            question_no,
            question_text: self.questions[qidx].text.clone(),
            totals: self
                .choices
                .iter()
                .map(|c| c.text.clone())
                .zip(totals)
                .collect(),
        })
    }

    /// The results of a question, shaped for chart display.
    pub fn chart_data(&self, question_no: u32) -> Result<ChartData, VotingError> {
        let tally = self.results(question_no)?;
        let mut labels: Vec<String> = Vec::new();
        let mut values: Vec<f64> = Vec::new();
        for (label, value) in tally.totals {
            labels.push(label);
            values.push(value);
        }
        Ok(ChartData { labels, values })
    }

    /// Per-group vote breakdown of a question, one entry per group in
    /// declaration order.
    pub fn group_tallies(&self, question_no: u32) -> Result<Vec<GroupTally>, VotingError> {
        if !self.started {
            return Err(VotingError::EventNotStarted);
        }
        let qidx = self.question_index(question_no)?;
        let mut tallies: Vec<GroupTally> = Vec::new();
        for (gidx, group) in self.groups.iter().enumerate() {
            let gid = GroupId(gidx as u32);
            let votes: Vec<u64> = (0..self.choices.len())
                .map(|cidx| self.tallies[&(gid, qidx, cidx)].votes)
                .collect();
            let weight = if self.choices.is_empty() {
                group.weight
            } else {
                self.tallies[&(gid, qidx, 0)].group_weight
            };
            tallies.push(GroupTally {
                group: group.name.clone(),
                votes,
                weight,
            });
        }
        Ok(tallies)
    }

    /// All procuration edges recorded for the event.
    pub fn procurations(&self) -> Vec<ProcurationInfo> {
        let mut edges: Vec<ProcurationInfo> = self
            .procurations
            .iter()
            .map(|(from, p)| ProcurationInfo {
                from: self.public_member(*from),
                to: self.public_member(p.holder),
                granted_on: p.granted_on,
                confirmed: p.confirmed,
                confirmed_on: p.confirmed_on,
            })
            .collect();
        edges.sort_by(|a, b| {
            (&a.from.last_name, &a.from.username).cmp(&(&b.from.last_name, &b.from.username))
        });
        edges
    }

    /// Number of ballots spent on a question (own votes and procurations).
    pub fn votes_cast(&self, question_no: u32) -> Result<u64, VotingError> {
        if !self.started {
            return Err(VotingError::EventNotStarted);
        }
        let qidx = self.question_index(question_no)?;
        Ok(self
            .tallies
            .iter()
            .filter(|((_, q, _), _)| *q == qidx)
            .map(|(_, cell)| cell.votes)
            .sum())
    }

    /// Whether the results of a question are valid: the share of spent
    /// ballots over the member count must exceed the event quorum.
    pub fn quorum_reached(&self, question_no: u32) -> Result<bool, VotingError> {
        let cast = self.votes_cast(question_no)?;
        if self.members.is_empty() {
            return Ok(false);
        }
        Ok(cast as f64 / self.members.len() as f64 > self.quorum as f64 / 100.0)
    }
}

// Rounding to 2 decimal places, ties to even, matching the renormalization
// semantics of the original tallies.
fn round_half_even2(x: f64) -> f64 {
    let scaled = x * 100.0;
    let floor = scaled.floor();
    let rounded = if (scaled - floor - 0.5).abs() < 1e-9 {
        if (floor as i64) % 2 == 0 {
            floor
        } else {
            floor + 1.0
        }
    } else {
        scaled.round()
    };
    rounded / 100.0
}
