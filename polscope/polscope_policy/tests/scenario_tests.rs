use polscope_core::types::ElementKind;
use polscope_core::PolicyAccessor;
use polscope_policy::model::{BitmapNode, MAPSIZE};
use polscope_policy::{
    Criterion, InMemoryPolicy, LevelCompare, MatchMode, MlsLevel, MlsRange, Operator,
    PolicySnapshot, Query, RangeMatch, SparseBitSet, Test, TestCondition,
};
use tracing_subscriber::EnvFilter;

const POLICY_TOML: &str = include_str!("fixtures/policy.toml");

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn load_policy() -> InMemoryPolicy {
    init_tracing();
    PolicySnapshot::from_toml_str(POLICY_TOML)
        .unwrap()
        .into_policy()
        .unwrap()
}

fn level(policy: &InMemoryPolicy, literal: &str) -> MlsLevel {
    MlsLevel::parse(policy, literal).unwrap()
}

fn range(policy: &InMemoryPolicy, literal: &str) -> MlsRange {
    MlsRange::parse(policy, literal).unwrap()
}

fn bitset(bits: &[u32]) -> SparseBitSet {
    bits.iter().copied().collect()
}

#[test]
fn test_scenario_a_bitmap_round_trip() {
    let set = bitset(&[0, 64, 65, 127]);
    let decoded = SparseBitSet::deserialize(&set.serialize().unwrap()).unwrap();

    let starts: Vec<u32> = decoded.nodes().iter().map(|n: &BitmapNode| n.startbit).collect();
    assert_eq!(starts, vec![0, 64]);
    assert_eq!(decoded.highbit(), 128);
    assert_eq!(decoded, set);
    assert_eq!(decoded.iter().collect::<Vec<_>>(), vec![0, 64, 65, 127]);
}

#[test]
fn test_scenario_b_category_range_dominates() {
    let policy = load_policy();
    let a = level(&policy, "s0:c0,c2.c4");
    assert_eq!(a.categories(), &["c0", "c2", "c3", "c4"]);

    let b = level(&policy, "s0:c2.c4");
    assert_eq!(a.compare(Some(&b), &policy).unwrap(), LevelCompare::Dom);
    assert_eq!(b.compare(Some(&a), &policy).unwrap(), LevelCompare::Domby);
}

#[test]
fn test_scenario_c_subranges() {
    let policy = load_policy();
    let outer = range(&policy, "s0:c0 - s1:c0.c10");

    assert!(outer
        .contains_subrange(&range(&policy, "s0:c0 - s0:c0.c5"), &policy)
        .unwrap());
    assert!(!outer.contains_subrange(&range(&policy, "s2 - s2"), &policy).unwrap());
}

#[test]
fn test_scenario_d_two_test_query() {
    let policy = load_policy();
    let mut query = Query::new(ElementKind::Type, MatchMode::All).unwrap();

    let mut name = Test::new(ElementKind::Type, TestCondition::Name).unwrap();
    let regex = Criterion::parse(&name, Operator::MatchRegex, false, "^httpd_.*", false).unwrap();
    name.add_criterion(regex).unwrap();
    query.add_test(name).unwrap();

    let mut attrs = Test::new(ElementKind::Type, TestCondition::Attributes).unwrap();
    let include = Criterion::parse(&attrs, Operator::Include, false, "file_type", false).unwrap();
    attrs.add_criterion(include).unwrap();
    query.add_test(attrs).unwrap();

    let results = query.run(&policy, None).unwrap();
    let names: Vec<&str> = results.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["httpd_log_t", "httpd_sys_content_t", "httpd_exec_t"]);

    for result in &results {
        assert_eq!(result.proofs.len(), 2, "{}", result.name);
        assert_eq!(result.proofs[0].condition, TestCondition::Name);
        assert_eq!(result.proofs[0].text, result.name);
        assert_eq!(result.proofs[1].condition, TestCondition::Attributes);
        assert_eq!(result.proofs[1].to_string(), "its assigned attributes file_type");
    }
}

#[test]
fn test_set_then_clear() {
    let mut set = SparseBitSet::new();
    for bit in [0, 1, 63, 64, 200, 4095] {
        set.set(bit, true);
        assert!(set.get(bit));
        set.set(bit, false);
        assert!(!set.get(bit));
    }
    assert!(set.is_empty());
    assert_eq!(set.highbit(), 0);
}

#[test]
fn test_union_properties() {
    let a = bitset(&[1, 70, 300]);
    let b = bitset(&[2, 70, 129]);
    let c = bitset(&[0, 5000]);

    assert_eq!(a.union(&b), b.union(&a));
    assert_eq!(a.union(&b).union(&c), a.union(&b.union(&c)));
    for set in [&a, &b, &c] {
        assert!(set.contains(set));
    }
    assert!(a.union(&b).contains(&a));
    assert!(!a.contains(&b));
}

#[test]
fn test_serialized_blob_layout() {
    let blob = bitset(&[3]).serialize().unwrap();
    assert_eq!(&blob[0..4], &MAPSIZE.to_le_bytes());
    assert_eq!(&blob[4..8], &64u32.to_le_bytes());
    assert_eq!(&blob[8..12], &1u32.to_le_bytes());
    assert_eq!(blob.len(), 12 + 12);
}

#[test]
fn test_level_compare_properties() {
    let policy = load_policy();
    let literals = ["s0", "s0:c1", "s0:c0.c3", "s1:c2", "s1:c0.c10", "s2", "s2:c4,c9"];
    let levels: Vec<MlsLevel> = literals.iter().map(|l| level(&policy, l)).collect();

    for l in &levels {
        assert_eq!(l.compare(Some(l), &policy).unwrap(), LevelCompare::Eq);
        assert_eq!(l.compare(None, &policy).unwrap(), LevelCompare::Eq);
    }
    for a in &levels {
        for b in &levels {
            let ab = a.compare(Some(b), &policy).unwrap();
            let ba = b.compare(Some(a), &policy).unwrap();
            assert_eq!(ab == LevelCompare::Dom, ba == LevelCompare::Domby, "{} vs {}", a, b);
        }
    }
}

#[test]
fn test_disjoint_categories_incomparable() {
    let policy = load_policy();
    let a = level(&policy, "s1:c0,c1");
    let b = level(&policy, "s1:c5.c7");
    assert_eq!(a.compare(Some(&b), &policy).unwrap(), LevelCompare::Incomp);

    let empty = level(&policy, "s1");
    assert_eq!(a.compare(Some(&empty), &policy).unwrap(), LevelCompare::Dom);
}

#[test]
fn test_range_contains_itself() {
    let policy = load_policy();
    for literal in ["s0", "s0 - s1:c0.c3", "s1:c2", "s0:c0 - s2:c0.c10"] {
        let r = range(&policy, literal);
        assert!(r.contains_subrange(&r, &policy).unwrap(), "{}", literal);
        assert!(r.compare(&r, RangeMatch::EXACT, &policy).unwrap(), "{}", literal);
    }
}

#[test]
fn test_single_range_matches_pair() {
    let policy = load_policy();
    let single = range(&policy, "s1:c0.c3");
    let pair = range(&policy, "s1:c0.c3 - s1:c0.c3");

    for literal in ["s1:c0.c3", "s1:c2", "s1", "s1:c0.c4", "s0:c0.c3", "s2:c0.c3"] {
        let l = level(&policy, literal);
        assert_eq!(
            single.includes_level(&l, &policy).unwrap(),
            pair.includes_level(&l, &policy).unwrap(),
            "includes {}",
            literal
        );
    }
    assert!(!single.includes_level(&level(&policy, "s1:c2"), &policy).unwrap());

    let modes = [
        RangeMatch::SUB,
        RangeMatch::SUPER,
        RangeMatch::EXACT,
        RangeMatch::INTERSECT,
    ];
    let others = [
        "s1:c0.c3",
        "s1:c2",
        "s1:c2 - s1:c0.c3",
        "s1:c0.c3 - s2:c0.c10",
        "s0 - s2:c0.c10",
        "s0:c1 - s1:c1",
    ];
    for literal in others {
        let other = range(&policy, literal);
        assert_eq!(
            single.contains_subrange(&other, &policy).unwrap(),
            pair.contains_subrange(&other, &policy).unwrap(),
            "contains {}",
            literal
        );
        for mode in modes {
            assert_eq!(
                single.compare(&other, mode, &policy).unwrap(),
                pair.compare(&other, mode, &policy).unwrap(),
                "{:?} against {}",
                mode,
                literal
            );
            assert_eq!(
                other.compare(&single, mode, &policy).unwrap(),
                other.compare(&pair, mode, &policy).unwrap(),
                "{} against {:?}",
                literal,
                mode
            );
        }
    }
    assert!(!single
        .contains_subrange(&range(&policy, "s1:c2 - s1:c0.c3"), &policy)
        .unwrap());
}

#[test]
fn test_bitmap_top_of_range() {
    let last_page = u32::MAX - (MAPSIZE - 1);
    let mut set = bitset(&[5, last_page]);
    set.set(u32::MAX, true);
    assert!(set.get(u32::MAX));
    assert!(set.get(last_page));
    assert_eq!(set.highbit(), 1u64 << 32);
    assert!(set.serialize().is_err());

    set.set(u32::MAX, false);
    set.set(last_page, false);
    assert_eq!(set.highbit(), 64);
    let decoded = SparseBitSet::deserialize(&set.serialize().unwrap()).unwrap();
    assert_eq!(decoded, set);

    let highest = bitset(&[u32::MAX - 64]);
    let decoded = SparseBitSet::deserialize(&highest.serialize().unwrap()).unwrap();
    assert_eq!(decoded.iter().collect::<Vec<_>>(), vec![u32::MAX - 64]);
}

#[test]
fn test_alias_resolution_in_levels() {
    let policy = load_policy();
    let by_alias = level(&policy, "unclassified:blue");
    assert_eq!(by_alias.render(&policy).unwrap(), "s0:c5");
    assert_eq!(
        by_alias.compare(Some(&level(&policy, "s0:c5")), &policy).unwrap(),
        LevelCompare::Eq
    );
}

#[test]
fn test_user_queries_through_ranges() {
    let policy = load_policy();
    let mut query = Query::new(ElementKind::User, MatchMode::All).unwrap();
    let mut test = Test::new(ElementKind::User, TestCondition::Range).unwrap();
    let intersect = Criterion::parse(&test, Operator::AsRangeIntersect, false, "s1:c3 - s2:c3.c10", false).unwrap();
    test.add_criterion(intersect).unwrap();
    query.add_test(test).unwrap();

    let names: Vec<String> = query
        .run(&policy, None)
        .unwrap()
        .into_iter()
        .map(|r| r.name)
        .collect();
    // guest_u's s1:c2 shares no level with s1:c3 - s2:c3.c10.
    assert_eq!(names, vec!["system_u", "staff_u"]);
    assert!(policy.resolve_by_name(ElementKind::User, "guest_u").is_ok());
}
