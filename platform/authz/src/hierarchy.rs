//! Role seniority.

use crate::Role;

/// Seniority order, most privileged first.
pub const ROLE_HIERARCHY: [Role; 11] = [
    Role::National,
    Role::Regional,
    Role::Zonal,
    Role::FacilityManager,
    Role::ProgramManager,
    Role::Finance,
    Role::Procurement,
    Role::Qa,
    Role::FacilityOfficer,
    Role::DataAnalyst,
    Role::Viewer,
];

/// Numeric seniority of a role. Higher means more privileged: `Viewer` is 0
/// and `National` is the maximum.
pub const fn rank(role: Role) -> u8 {
    let mut idx = 0;
    while idx < ROLE_HIERARCHY.len() {
        if ROLE_HIERARCHY[idx] as u8 == role as u8 {
            return (ROLE_HIERARCHY.len() - 1 - idx) as u8;
        }
        idx += 1;
    }
    0
}

pub fn has_higher_or_equal_rank(subject: Role, threshold: Role) -> bool {
    rank(subject) >= rank(threshold)
}

/// Strict variant of [`has_higher_or_equal_rank`].
pub fn outranks(subject: Role, other: Role) -> bool {
    rank(subject) > rank(other)
}

pub fn highest<I>(roles: I) -> Option<Role>
where
    I: IntoIterator<Item = Role>,
{
    roles.into_iter().max_by_key(|role| rank(*role))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hierarchy_covers_every_role_once() {
        for role in Role::ALL {
            let hits = ROLE_HIERARCHY.iter().filter(|r| **r == role).count();
            assert_eq!(hits, 1, "{role} should appear exactly once");
        }
    }

    #[test]
    fn rank_is_injective_and_descends() {
        let ranks: Vec<u8> = ROLE_HIERARCHY.iter().map(|r| rank(*r)).collect();
        for pair in ranks.windows(2) {
            assert!(pair[0] > pair[1]);
        }
        assert_eq!(rank(Role::National), 10);
        assert_eq!(rank(Role::Viewer), 0);
    }

    #[test]
    fn comparison_is_reflexive() {
        for role in Role::ALL {
            assert!(has_higher_or_equal_rank(role, role));
            assert!(!outranks(role, role));
        }
    }

    #[test]
    fn comparison_is_transitive() {
        for a in Role::ALL {
            for b in Role::ALL {
                for c in Role::ALL {
                    if has_higher_or_equal_rank(a, b) && has_higher_or_equal_rank(b, c) {
                        assert!(has_higher_or_equal_rank(a, c), "{a} >= {b} >= {c}");
                    }
                }
            }
        }
    }

    #[test]
    fn highest_picks_most_senior() {
        let picked = highest([Role::Qa, Role::Zonal, Role::Viewer]);
        assert_eq!(picked, Some(Role::Zonal));
        assert_eq!(highest(std::iter::empty()), None);
    }
}
