//! Search filter construction
//!
//! Account names come from the authenticated principal or from group DNs,
//! so they are escaped before being placed in a filter.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Directory object class searched for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectClass {
    User,
    Group,
}

impl ObjectClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectClass::User => "user",
            ObjectClass::Group => "group",
        }
    }
}

impl fmt::Display for ObjectClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `(&(objectClass=<class>)(sAMAccountName=<account>))` with the account escaped
pub fn account_filter(object_class: ObjectClass, account: &str) -> String {
    format!(
        "(&(objectClass={})(sAMAccountName={}))",
        object_class.as_str(),
        ldap3::ldap_escape(account)
    )
}

pub fn user_filter(account: &str) -> String {
    account_filter(ObjectClass::User, account)
}

pub fn group_filter(group: &str) -> String {
    account_filter(ObjectClass::Group, group)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_templates() {
        assert_eq!(
            user_filter("alice"),
            "(&(objectClass=user)(sAMAccountName=alice))"
        );
        assert_eq!(
            group_filter("TestGroup"),
            "(&(objectClass=group)(sAMAccountName=TestGroup))"
        );
    }

    #[test]
    fn test_filter_escapes_special_characters() {
        assert_eq!(
            user_filter("*)(objectClass=*"),
            "(&(objectClass=user)(sAMAccountName=\\2a\\29\\28objectClass=\\2a))"
        );
        assert_eq!(
            group_filter("back\\slash"),
            "(&(objectClass=group)(sAMAccountName=back\\5cslash))"
        );
    }

    #[test]
    fn test_plain_names_pass_through() {
        assert_eq!(
            group_filter("Domain Users"),
            "(&(objectClass=group)(sAMAccountName=Domain Users))"
        );
    }
}
