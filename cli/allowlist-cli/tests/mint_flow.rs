use allowlist_cli::{
    parse_address, verify_proof, AllowlistBuilder, Cohort, Ledger, LedgerConfig, LedgerError,
    LeafEncoding, MintState,
};

const OPERATOR: &str = "0xeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeee";
const X: &str = "0x1000000000000000000000000000000000000001";
const Y: &str = "0x2000000000000000000000000000000000000002";
const Z: &str = "0x3000000000000000000000000000000000000003";
const W: &str = "0x4000000000000000000000000000000000000004";

#[test]
fn reapers_allowlist_mint_flow() {
    let operator = parse_address(OPERATOR).unwrap();
    let [x, y, z, w] = [X, Y, Z, W].map(|a| parse_address(a).unwrap());
    let reapers = Cohort::new("reapers").unwrap();

    let allowlist = AllowlistBuilder::salted(reapers.clone())
        .build(&[x, y, z])
        .unwrap();
    let root = allowlist.root();

    let mut config = LedgerConfig::new(operator);
    config.leaf_encoding = LeafEncoding::CohortSalted;
    config.per_wallet_limit = Some(1);
    let mut ledger = Ledger::new(config);
    ledger
        .set_mint_state(operator, MintState::AllowlistPhase)
        .unwrap();
    ledger.set_roots(operator, vec![(reapers.clone(), root)]).unwrap();
    assert_eq!(ledger.current_root(&reapers), Some(root));

    let x_proof = allowlist.proof_for(&x).unwrap();
    assert_eq!(ledger.mint(x, &x_proof, 0), Ok(0));
    assert_eq!(ledger.owner_of(0), Ok(x));

    // Same proof again hits the per-wallet limit.
    assert_eq!(
        ledger.mint(x, &x_proof, 0),
        Err(LedgerError::WalletLimitReached { limit: 1 })
    );

    // W is not on the list, whatever proof it brings.
    for proof in [&x_proof, &allowlist.proof_for(&y).unwrap(), &vec![]] {
        assert_eq!(ledger.mint(w, proof, 0), Err(LedgerError::NotAllowlisted));
    }

    // Y and Z still get in.
    assert_eq!(ledger.mint(y, &allowlist.proof_for(&y).unwrap(), 0), Ok(1));
    assert_eq!(ledger.mint(z, &allowlist.proof_for(&z).unwrap(), 0), Ok(2));
    assert_eq!(ledger.total_minted(), 3);

    // Opening the public phase lets W mint without a proof.
    ledger.set_mint_state(operator, MintState::PublicPhase).unwrap();
    assert_eq!(ledger.mint(w, &[], 0), Ok(3));
}

#[test]
fn transfer_keeps_registry_consistent() {
    let operator = parse_address(OPERATOR).unwrap();
    let [a, b] = [X, Y].map(|s| parse_address(s).unwrap());

    let mut ledger = Ledger::new(LedgerConfig::new(operator));
    ledger.set_mint_state(operator, MintState::PublicPhase).unwrap();
    for _ in 0..3 {
        ledger.mint(a, &[], 0).unwrap();
    }

    ledger.transfer(a, 1, a, b).unwrap();
    assert_eq!(ledger.owner_of(1), Ok(b));
    assert_eq!(ledger.balance_of(&a), 2);
    assert_eq!(ledger.balance_of(&b), 1);
    assert_eq!(ledger.tokens_of(&a), vec![0, 2]);

    assert_eq!(ledger.transfer(a, 1, a, b), Err(LedgerError::NotOwner(1)));
}

#[test]
fn allowlists_build_and_verify_in_parallel() {
    let cohorts: Vec<Vec<[u8; 20]>> = (1..=4u8)
        .map(|c| (1..=(c * 5)).map(|i| [i.wrapping_mul(c); 20]).collect())
        .collect();

    std::thread::scope(|scope| {
        let handles: Vec<_> = cohorts
            .iter()
            .map(|members| {
                scope.spawn(move || {
                    let list = AllowlistBuilder::plain().build(members).unwrap();
                    members.iter().all(|m| {
                        let proof = list.proof_for(m).unwrap();
                        verify_proof(&proof, &list.leaf_of(m), &list.root())
                    })
                })
            })
            .collect();
        for handle in handles {
            assert!(handle.join().unwrap());
        }
    });
}
