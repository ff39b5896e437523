//! Channel population fixtures.
//!
//! Each entry maps a channel to its members, in join order; the first
//! member is the channel operator. `@`/`+` markers on later members mean
//! the operator grants them `+o`/`+v` right after they join. The `None`
//! channel holds users who connect without joining anything.

pub type ChannelFixture = &'static [(Option<&'static str>, &'static [&'static str])];

/// Three channels with disjoint user sets.
pub const CHANNELS1: ChannelFixture = &[
    (Some("#test1"), &["@user1", "user2", "user3"]),
    (Some("#test2"), &["@user4", "user5", "user6"]),
    (Some("#test3"), &["@user7", "user8", "user9"]),
];

/// Like [`CHANNELS1`], plus two users in no channel at all.
pub const CHANNELS2: ChannelFixture = &[
    (Some("#test1"), &["@user1", "user2", "user3"]),
    (Some("#test2"), &["@user4", "user5", "user6"]),
    (Some("#test3"), &["@user7", "user8", "user9"]),
    (None, &["user10", "user11"]),
];

/// Overlapping memberships, extra operators and voiced users.
pub const CHANNELS3: ChannelFixture = &[
    (Some("#test1"), &["@user1", "user2", "user3"]),
    (Some("#test2"), &["@user2"]),
    (Some("#test3"), &["@user3", "@user4", "user5", "user6"]),
    (Some("#test4"), &["@user7", "+user8", "+user9", "user1", "user2"]),
    (Some("#test5"), &["@user1", "@user5"]),
    (None, &["user10", "user11"]),
];

/// Connected users only, no channels formed.
pub const CHANNELS4: ChannelFixture = &[(None, &["user1", "user2", "user3", "user4", "user5"])];
