use serde::{Deserialize, Serialize};

use crate::groups::repo::GroupDetails;

#[derive(Debug, Deserialize)]
pub struct CreateGroupRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub schedule: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub chronic: String,
    pub master: Option<i64>,
}

/// Partial update: only the provided fields change.
#[derive(Debug, Deserialize)]
pub struct UpdateGroupRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub schedule: Option<String>,
    pub location: Option<String>,
    pub chronic: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GroupsQuery {
    pub user: Option<i64>,
    pub text: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GroupBody {
    pub group: GroupDetails,
}

/// Listing envelope: clients read `groups.data`, with `meta` describing the
/// result set.
#[derive(Debug, Serialize)]
pub struct GroupsBody {
    pub groups: GroupsPage,
}

#[derive(Debug, Serialize)]
pub struct GroupsPage {
    pub meta: PageMeta,
    pub data: Vec<GroupDetails>,
}

#[derive(Debug, Serialize)]
pub struct PageMeta {
    pub total: usize,
}

impl GroupsPage {
    pub fn new(data: Vec<GroupDetails>) -> Self {
        Self {
            meta: PageMeta { total: data.len() },
            data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_envelope_nests_data_under_groups() {
        let body = GroupsBody {
            groups: GroupsPage::new(vec![]),
        };
        let json = serde_json::to_value(body).unwrap();
        assert!(json["groups"]["data"].as_array().unwrap().is_empty());
        assert_eq!(json["groups"]["meta"]["total"], 0);
    }
}
