use crate::libs::core::ids::{GroupId, UserId};
use crate::libs::core::models::PresenceStatus;
use crate::libs::storage::records::{GroupRecord, PresenceRecord};
use crate::ChatError;
use std::collections::HashMap;

/// Builds a new group with `admin` as its first member.
pub fn new_group(
    name: &str,
    admin: &UserId,
    selected: &[UserId],
    created_at: i64,
) -> Result<GroupRecord, ChatError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ChatError::EmptyGroupName);
    }
    if selected.is_empty() {
        return Err(ChatError::NoGroupMembers);
    }

    let mut members = vec![admin.clone()];
    append_unique(&mut members, selected);

    Ok(GroupRecord {
        group_id: GroupId::generate(),
        name: name.to_string(),
        admin_id: admin.clone(),
        members,
        created_at,
    })
}

pub fn with_added_members(
    group: &GroupRecord,
    actor: &UserId,
    added: &[UserId],
) -> Result<Vec<UserId>, ChatError> {
    ensure_admin(group, actor)?;
    if added.is_empty() {
        return Err(ChatError::NoMembersSelected);
    }

    let mut members = group.members.clone();
    append_unique(&mut members, added);
    Ok(members)
}

pub fn without_member(
    group: &GroupRecord,
    actor: &UserId,
    member: &UserId,
) -> Result<Vec<UserId>, ChatError> {
    ensure_admin(group, actor)?;
    if group.is_admin(member) {
        return Err(ChatError::CannotRemoveAdmin);
    }

    Ok(group
        .members
        .iter()
        .filter(|id| *id != member)
        .cloned()
        .collect())
}

pub fn online_count(group: &GroupRecord, presence: &HashMap<UserId, PresenceRecord>) -> usize {
    group
        .members
        .iter()
        .filter(|member| {
            presence
                .get(*member)
                .is_some_and(|record| record.status == PresenceStatus::Online)
        })
        .count()
}

fn ensure_admin(group: &GroupRecord, actor: &UserId) -> Result<(), ChatError> {
    if group.is_admin(actor) {
        Ok(())
    } else {
        Err(ChatError::NotGroupAdmin)
    }
}

fn append_unique(members: &mut Vec<UserId>, extra: &[UserId]) {
    for id in extra {
        if !members.contains(id) {
            members.push(id.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[&str]) -> Vec<UserId> {
        raw.iter().map(|id| UserId::from(*id)).collect()
    }

    #[test]
    fn creator_is_admin_and_first_member() {
        let admin = UserId::from("00191520");
        let group = new_group("  Poster Team ", &admin, &ids(&["20202020", "00191520", "20202020"]), 7)
            .unwrap();
        assert_eq!(group.name, "Poster Team");
        assert_eq!(group.admin_id, admin);
        assert_eq!(group.members, ids(&["00191520", "20202020"]));
        assert_eq!(group.created_at, 7);
    }

    #[test]
    fn creation_needs_name_and_members() {
        let admin = UserId::from("00191520");
        assert!(matches!(
            new_group("   ", &admin, &ids(&["20202020"]), 0),
            Err(ChatError::EmptyGroupName)
        ));
        assert!(matches!(
            new_group("Team", &admin, &[], 0),
            Err(ChatError::NoGroupMembers)
        ));
    }

    #[test]
    fn only_admin_manages_members() {
        let admin = UserId::from("00191520");
        let member = UserId::from("20202020");
        let group = new_group("Team", &admin, &[member.clone()], 0).unwrap();

        assert!(matches!(
            with_added_members(&group, &member, &ids(&["59200311"])),
            Err(ChatError::NotGroupAdmin)
        ));
        assert!(matches!(
            without_member(&group, &member, &admin),
            Err(ChatError::NotGroupAdmin)
        ));
        assert!(matches!(
            without_member(&group, &admin, &admin),
            Err(ChatError::CannotRemoveAdmin)
        ));

        let added = with_added_members(&group, &admin, &ids(&["59200311", "20202020"])).unwrap();
        assert_eq!(added, ids(&["00191520", "20202020", "59200311"]));

        let removed = without_member(&group, &admin, &member).unwrap();
        assert_eq!(removed, ids(&["00191520"]));
    }

    #[test]
    fn counts_only_online_members() {
        let admin = UserId::from("a");
        let group = new_group("Team", &admin, &ids(&["b", "c"]), 0).unwrap();
        let mut presence = HashMap::new();
        for (id, status) in [
            ("a", PresenceStatus::Online),
            ("b", PresenceStatus::Idle),
            ("z", PresenceStatus::Online),
        ] {
            presence.insert(
                UserId::from(id),
                PresenceRecord {
                    user_id: UserId::from(id),
                    status,
                    last_seen: 0,
                    name: id.to_string(),
                },
            );
        }
        assert_eq!(online_count(&group, &presence), 1);
    }
}
