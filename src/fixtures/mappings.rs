use crate::permissions::{MappingRecord, Role};

pub fn mapping_record(group: &str, team: &str, role: Role) -> MappingRecord {
    MappingRecord {
        source_group: group.to_string(),
        destination_team: team.to_string(),
        role,
    }
}

pub fn developer_table() -> Vec<MappingRecord> {
    vec![mapping_record("Developers", "dev-team", Role::Push)]
}
