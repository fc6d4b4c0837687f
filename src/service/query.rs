//! Read-side projections over a ticket snapshot. Nothing here touches the
//! store; every function takes the snapshot it works on.

use std::cmp::Reverse;
use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::model::notification::Notification;
use crate::model::ticket::{Ticket, TicketPriority, TicketStatus, TicketType};

/// A field filter where the literal `all` lifts the restriction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Filter<T> {
    #[default]
    All,
    Only(T),
}

impl<T: PartialEq> Filter<T> {
    pub fn matches(&self, value: &T) -> bool {
        match self {
            Filter::All => true,
            Filter::Only(expected) => expected == value,
        }
    }
}

impl<'de, T> Deserialize<'de> for Filter<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct FilterVisitor<T>(PhantomData<T>);

        impl<T> Visitor<'_> for FilterVisitor<T>
        where
            T: FromStr,
            T::Err: fmt::Display,
        {
            type Value = Filter<T>;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("`all` or an enum value")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                if v.is_empty() || v == "all" {
                    return Ok(Filter::All);
                }
                v.parse().map(Filter::Only).map_err(E::custom)
            }
        }

        deserializer.deserialize_str(FilterVisitor(PhantomData))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum SortOrder {
    #[default]
    Newest,
    Oldest,
    PriorityHigh,
    PriorityLow,
    RecentlyUpdated,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase", default)]
#[into_params(parameter_in = Query)]
pub struct TicketQuery {
    /// Case-insensitive substring of subject or description.
    pub search: Option<String>,
    #[param(value_type = Option<String>)]
    pub status: Filter<TicketStatus>,
    #[param(value_type = Option<String>)]
    pub priority: Filter<TicketPriority>,
    #[serde(rename = "type")]
    #[param(value_type = Option<String>)]
    pub ticket_type: Filter<TicketType>,
    pub user_id: Option<String>,
    pub assigned_to: Option<String>,
    pub department: Option<String>,
    pub tag: Option<String>,
    #[param(value_type = Option<SortOrder>)]
    pub sort_by: SortOrder,
}

impl TicketQuery {
    fn keeps(&self, ticket: &Ticket, needle: Option<&str>) -> bool {
        if let Some(needle) = needle {
            let hit = ticket.subject.to_lowercase().contains(needle)
                || ticket.description.to_lowercase().contains(needle);
            if !hit {
                return false;
            }
        }

        self.status.matches(&ticket.status)
            && self.priority.matches(&ticket.priority)
            && self.ticket_type.matches(&ticket.ticket_type)
            && self.user_id.as_ref().is_none_or(|owner| *owner == ticket.user_id)
            && self
                .assigned_to
                .as_ref()
                .is_none_or(|agent| ticket.assigned_to.as_ref() == Some(agent))
            && self
                .department
                .as_ref()
                .is_none_or(|dept| ticket.department.as_ref() == Some(dept))
            && self.tag.as_ref().is_none_or(|tag| ticket.tags.contains(tag))
    }
}

/// Filters then sorts. The sort is stable, so ties keep snapshot order.
pub fn query<'a>(tickets: &'a [Ticket], params: &TicketQuery) -> Vec<&'a Ticket> {
    let needle = params
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase);

    let mut out: Vec<&Ticket> = tickets
        .iter()
        .filter(|t| params.keeps(t, needle.as_deref()))
        .collect();

    match params.sort_by {
        SortOrder::Newest => out.sort_by_key(|t| Reverse(t.created_at)),
        SortOrder::Oldest => out.sort_by_key(|t| t.created_at),
        SortOrder::PriorityHigh => out.sort_by_key(|t| t.priority.rank()),
        SortOrder::PriorityLow => out.sort_by_key(|t| Reverse(t.priority.rank())),
        SortOrder::RecentlyUpdated => out.sort_by_key(|t| Reverse(t.updated_at)),
    }
    out
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TicketStats {
    pub total: usize,
    pub new: usize,
    pub in_progress: usize,
    pub on_hold: usize,
    pub resolved: usize,
    pub closed: usize,
    /// Not yet resolved or closed.
    pub open: usize,
    pub done: usize,
    /// High or critical and not closed.
    pub urgent: usize,
    /// Unassigned and not closed.
    pub unassigned: usize,
}

pub fn summarize(tickets: &[Ticket]) -> TicketStats {
    tickets.iter().fold(TicketStats::default(), |mut stats, t| {
        stats.total += 1;
        match t.status {
            TicketStatus::New => stats.new += 1,
            TicketStatus::InProgress => stats.in_progress += 1,
            TicketStatus::OnHold => stats.on_hold += 1,
            TicketStatus::Resolved => stats.resolved += 1,
            TicketStatus::Closed => stats.closed += 1,
        }
        if t.status.is_terminal() {
            stats.done += 1;
        } else {
            stats.open += 1;
        }
        let closed = t.status == TicketStatus::Closed;
        if !closed && matches!(t.priority, TicketPriority::High | TicketPriority::Critical) {
            stats.urgent += 1;
        }
        if !closed && t.assigned_to.is_none() {
            stats.unassigned += 1;
        }
        stats
    })
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BoardColumn {
    pub status: TicketStatus,
    pub tickets: Vec<Ticket>,
}

/// One column per status, in lifecycle order, empty columns included.
pub fn board(tickets: &[Ticket]) -> Vec<BoardColumn> {
    TicketStatus::ALL
        .into_iter()
        .map(|status| BoardColumn {
            status,
            tickets: tickets.iter().filter(|t| t.status == status).cloned().collect(),
        })
        .collect()
}

pub fn unread_count(notifications: &[Notification], user_id: &str) -> usize {
    notifications
        .iter()
        .filter(|n| n.user_id == user_id && !n.read)
        .count()
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};
    use uuid::Uuid;

    use super::*;
    use crate::model::notification::NotificationKind;

    fn ticket(subject: &str, priority: TicketPriority, age_minutes: i64) -> Ticket {
        let base = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let created = base - Duration::minutes(age_minutes);
        Ticket {
            id: Uuid::new_v4(),
            user_id: "user-1".into(),
            assigned_to: None,
            department: None,
            ticket_type: TicketType::Bug,
            priority,
            status: TicketStatus::New,
            subject: subject.into(),
            description: format!("{subject} happens every time I open the dashboard page"),
            attachments: vec![],
            comments: vec![],
            status_history: vec![],
            sla: None,
            tags: vec![],
            custom_fields: None,
            created_at: created,
            updated_at: created,
            closed_at: None,
            first_response_at: None,
        }
    }

    fn subjects(tickets: &[&Ticket]) -> Vec<String> {
        tickets.iter().map(|t| t.subject.clone()).collect()
    }

    fn sample() -> Vec<Ticket> {
        vec![
            ticket("Login fails", TicketPriority::Medium, 30),
            ticket("Export is slow", TicketPriority::Critical, 10),
            ticket("Typo in footer", TicketPriority::Low, 20),
            ticket("Cannot upload", TicketPriority::High, 40),
        ]
    }

    #[test]
    fn query_is_pure_and_repeatable() {
        let tickets = sample();
        let before = tickets.clone();
        let params = TicketQuery { sort_by: SortOrder::PriorityHigh, ..Default::default() };

        let first = subjects(&query(&tickets, &params));
        let second = subjects(&query(&tickets, &params));

        assert_eq!(first, second);
        assert_eq!(tickets, before);
    }

    #[test]
    fn sorts_by_every_order() {
        let tickets = sample();
        let sorted = |sort_by| subjects(&query(&tickets, &TicketQuery { sort_by, ..Default::default() }));

        assert_eq!(
            sorted(SortOrder::Newest),
            ["Export is slow", "Typo in footer", "Login fails", "Cannot upload"]
        );
        assert_eq!(
            sorted(SortOrder::Oldest),
            ["Cannot upload", "Login fails", "Typo in footer", "Export is slow"]
        );
        assert_eq!(
            sorted(SortOrder::PriorityHigh),
            ["Export is slow", "Cannot upload", "Login fails", "Typo in footer"]
        );
        assert_eq!(
            sorted(SortOrder::PriorityLow),
            ["Typo in footer", "Login fails", "Cannot upload", "Export is slow"]
        );
    }

    #[test]
    fn recently_updated_uses_updated_at() {
        let mut tickets = sample();
        tickets[2].updated_at = Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 0).unwrap();
        let params = TicketQuery { sort_by: SortOrder::RecentlyUpdated, ..Default::default() };
        assert_eq!(query(&tickets, &params)[0].subject, "Typo in footer");
    }

    #[test]
    fn ties_keep_input_order() {
        let tickets = vec![
            ticket("first", TicketPriority::High, 5),
            ticket("second", TicketPriority::High, 1),
            ticket("third", TicketPriority::High, 3),
        ];
        let params = TicketQuery { sort_by: SortOrder::PriorityHigh, ..Default::default() };
        assert_eq!(subjects(&query(&tickets, &params)), ["first", "second", "third"]);
    }

    #[test]
    fn search_is_case_insensitive_over_subject_and_description() {
        let tickets = sample();
        let search = |text: &str| {
            subjects(&query(&tickets, &TicketQuery { search: Some(text.into()), ..Default::default() }))
        };
        assert_eq!(search("LOGIN"), ["Login fails"]);
        assert_eq!(search("dashboard").len(), 4);
        assert!(search("nothing like this").is_empty());
    }

    #[test]
    fn field_filters_combine() {
        let mut tickets = sample();
        tickets[0].status = TicketStatus::InProgress;
        tickets[0].assigned_to = Some("agent-1".into());
        tickets[0].tags = vec!["auth".into()];

        let params = TicketQuery {
            status: Filter::Only(TicketStatus::InProgress),
            assigned_to: Some("agent-1".into()),
            tag: Some("auth".into()),
            ..Default::default()
        };
        assert_eq!(subjects(&query(&tickets, &params)), ["Login fails"]);

        let params = TicketQuery { priority: Filter::Only(TicketPriority::Low), ..Default::default() };
        assert_eq!(subjects(&query(&tickets, &params)), ["Typo in footer"]);
    }

    #[test]
    fn all_sentinel_deserializes_to_no_filter() {
        let params: TicketQuery =
            serde_json::from_str(r#"{"status":"all","priority":"high","sortBy":"oldest"}"#).unwrap();
        assert_eq!(params.status, Filter::All);
        assert_eq!(params.priority, Filter::Only(TicketPriority::High));
        assert_eq!(params.sort_by, SortOrder::Oldest);

        assert!(serde_json::from_str::<TicketQuery>(r#"{"status":"pending"}"#).is_err());
    }

    #[test]
    fn summary_counts() {
        let mut tickets = sample();
        tickets[0].status = TicketStatus::Closed;
        tickets[1].status = TicketStatus::Resolved;
        tickets[3].assigned_to = Some("agent-1".into());

        let stats = summarize(&tickets);
        assert_eq!(stats.total, 4);
        assert_eq!(stats.closed, 1);
        assert_eq!(stats.resolved, 1);
        assert_eq!(stats.open, 2);
        assert_eq!(stats.done, 2);
        // critical (resolved) and high (new)
        assert_eq!(stats.urgent, 2);
        assert_eq!(stats.unassigned, 2);
    }

    #[test]
    fn board_has_a_column_per_status() {
        let mut tickets = sample();
        tickets[1].status = TicketStatus::OnHold;
        let columns = board(&tickets);
        assert_eq!(columns.len(), 5);
        assert_eq!(columns[0].tickets.len(), 3);
        assert_eq!(columns[2].status, TicketStatus::OnHold);
        assert_eq!(columns[2].tickets[0].subject, "Export is slow");
    }

    #[test]
    fn unread_counts_only_the_recipients_unread() {
        let notice = |user: &str, read| Notification {
            id: Uuid::new_v4(),
            user_id: user.into(),
            ticket_id: Uuid::new_v4(),
            message: "m".into(),
            read,
            created_at: Utc::now(),
            kind: NotificationKind::Comment,
        };
        let all = vec![notice("user-1", false), notice("user-1", true), notice("user-2", false)];
        assert_eq!(unread_count(&all, "user-1"), 1);
    }
}
