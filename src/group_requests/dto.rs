use serde::{Deserialize, Serialize};

use crate::group_requests::repo::{GroupRequest, PendingRequestRow};

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub master: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupRequestBody {
    pub group_request: GroupRequest,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupRequestsBody {
    pub group_requests: Vec<GroupRequestItem>,
}

/// List entry enriched with the requester and the group it targets.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupRequestItem {
    pub id: i64,
    pub user_id: i64,
    pub group_id: i64,
    pub status: String,
    pub user: RequesterInfo,
    pub group: GroupInfo,
}

#[derive(Debug, Serialize)]
pub struct RequesterInfo {
    pub username: String,
}

#[derive(Debug, Serialize)]
pub struct GroupInfo {
    pub name: String,
    pub master: i64,
}

impl From<PendingRequestRow> for GroupRequestItem {
    fn from(row: PendingRequestRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            group_id: row.group_id,
            status: row.status,
            user: RequesterInfo {
                username: row.username,
            },
            group: GroupInfo {
                name: row.group_name,
                master: row.group_master,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_item_nests_user_and_group() {
        let item = GroupRequestItem::from(PendingRequestRow {
            id: 1,
            user_id: 9,
            group_id: 3,
            status: "PENDING".into(),
            username: "bard".into(),
            group_name: "The Misfits".into(),
            group_master: 7,
        });
        let json = serde_json::to_value(item).unwrap();
        assert_eq!(json["user"]["username"], "bard");
        assert_eq!(json["group"]["name"], "The Misfits");
        assert_eq!(json["group"]["master"], 7);
        assert_eq!(json["userId"], 9);
    }
}
