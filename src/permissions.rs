use serde::{Deserialize, Serialize};

/// Coarse source-platform role as written in the mapping file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Push,
    Pull,
}

/// Role vocabulary of the destination platform's teams API.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TeamRole {
    Maintainer,
    Member,
}

impl TeamRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            TeamRole::Maintainer => "maintainer",
            TeamRole::Member => "member",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct MappingRecord {
    pub source_group: String,
    pub destination_team: String,
    pub role: Role,
}

/// One desired (team, user, role) assignment, prior to being applied.
#[derive(Clone, Debug, PartialEq)]
pub struct MembershipIntent {
    pub team: String,
    pub user: String,
    pub role: TeamRole,
}

/// Only `admin` escalates; every other source role lands on the destination's
/// default `member`. Least privilege depends on this staying asymmetric.
fn translate_role(role: Role) -> TeamRole {
    match role {
        Role::Admin => TeamRole::Maintainer,
        _ => TeamRole::Member,
    }
}

/// Expands the mapping table into membership intents: for each record, in
/// table order, one intent per resolved group member, in member order.
/// Duplicate source groups are legal; later records win when applied.
pub fn translate<F>(table: &[MappingRecord], lookup: F) -> Vec<MembershipIntent>
where
    F: Fn(&str) -> Vec<String>,
{
    let mut intents = Vec::new();
    for record in table {
        let role = translate_role(record.role);
        for user in lookup(&record.source_group) {
            intents.push(MembershipIntent {
                team: record.destination_team.clone(),
                user,
                role,
            });
        }
    }
    intents
}
