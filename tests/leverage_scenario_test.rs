use leverslot::domain::{Address, Amount, Timestamp};
use leverslot::ledger::LendingLedger;
use leverslot::protocol::{OpenPosition, ProtocolError, VaultState};
use leverslot::routing::{plan_close_full, plan_close_partial, MockRouteSource};
use leverslot::sandbox::{Sandbox, SandboxChain, SANDBOX_LIQUIDITY};
use leverslot::swap::MockSwapExecutor;
use leverslot::{Host, MemoryLedger, ProtocolEvent};
use rust_decimal::Decimal;

type TestHost = Host<MemoryLedger, MockSwapExecutor>;

struct TestWorld {
    host: TestHost,
    factory: Address,
    usdc: Address,
    usdt: Address,
}

fn a(s: &str) -> Amount {
    Amount::from_str_canonical(s).unwrap()
}

/// 30 * 101 / 99: borrow sized so a 1% worse swap still reaches 30.
fn scenario_borrow() -> Amount {
    Amount::from(30)
        .checked_mul(Decimal::from(101))
        .and_then(|x| x.checked_div(Decimal::from(99)))
        .unwrap()
}

async fn setup() -> TestWorld {
    let sandbox = Sandbox::build(137, Timestamp::new(1_700_000_000)).unwrap();
    let (usdc, usdt) = (sandbox.usdc, sandbox.usdt);
    let host = Host::new(sandbox.chain);
    let factory = Address::from_label("factory");
    host.deploy_factory(factory).await.unwrap();
    TestWorld {
        host,
        factory,
        usdc,
        usdt,
    }
}

async fn fund(world: &TestWorld, account: Address, amount: Amount) {
    let usdc = world.usdc;
    world
        .host
        .transact("faucet", move |chain: &mut SandboxChain| {
            chain.mint(&usdc, &account, amount)
        })
        .await
        .unwrap();
}

fn open_request(world: &TestWorld, owner: Address, target: Amount) -> OpenPosition {
    let borrow = scenario_borrow();
    OpenPosition {
        owner,
        collateral_asset: world.usdc,
        debt_asset: world.usdt,
        deposit_amount: a("1"),
        target_collateral: target,
        borrow_amount: borrow,
        swap: MockSwapExecutor::instruction(world.usdt, world.usdc, borrow, target),
        expected_vault: None,
    }
}

async fn open_scenario(world: &TestWorld, owner: Address) -> Address {
    fund(world, owner, a("1")).await;
    let predicted = world.host.next_address(&world.factory).await.unwrap();
    world
        .host
        .approve(world.usdc, owner, predicted, a("1"))
        .await
        .unwrap();
    let receipt = world
        .host
        .open_position(world.factory, owner, open_request(world, owner, a("30")))
        .await
        .unwrap();
    receipt.value.0
}

#[tokio::test]
async fn test_open_lands_at_predicted_address_with_exact_debt() {
    let world = setup().await;
    let alice = Address::from_label("alice");
    let predicted = world.host.next_address(&world.factory).await.unwrap();

    let vault = open_scenario(&world, alice).await;
    assert_eq!(vault, predicted);

    let (collateral, debt, state) = world
        .host
        .view(|chain| {
            (
                chain.ledger.collateral_balance(&vault, &world.usdc),
                chain.ledger.debt_balance(&vault, &world.usdt),
                chain.vault(&vault).map(|v| v.state()),
            )
        })
        .await;
    assert!(collateral > a("31"));
    assert_eq!(debt, scenario_borrow());
    assert_eq!(state, Ok(VaultState::Open));
    assert_ne!(world.host.next_address(&world.factory).await.unwrap(), predicted);
}

#[tokio::test]
async fn test_open_receipt_lists_deploy_then_open_events() {
    let world = setup().await;
    let alice = Address::from_label("alice");
    fund(&world, alice, a("1")).await;
    let predicted = world.host.next_address(&world.factory).await.unwrap();
    world.host.approve(world.usdc, alice, predicted, a("1")).await.unwrap();

    let receipt = world
        .host
        .open_position(world.factory, alice, open_request(&world, alice, a("30")))
        .await
        .unwrap();
    let kinds: Vec<&str> = receipt.events.iter().map(|r| r.event.kind()).collect();
    assert_eq!(kinds, vec!["vaultDeployed", "positionOpened"]);
    match &receipt.events[1].event {
        ProtocolEvent::PositionOpened {
            deposit, borrowed, ..
        } => {
            assert_eq!(*deposit, a("1"));
            assert_eq!(*borrowed, scenario_borrow());
        }
        other => panic!("unexpected event {:?}", other),
    }
}

#[tokio::test]
async fn test_missed_target_reverts_everything() {
    let world = setup().await;
    let alice = Address::from_label("alice");
    fund(&world, alice, a("1")).await;
    let predicted = world.host.next_address(&world.factory).await.unwrap();
    world.host.approve(world.usdc, alice, predicted, a("1")).await.unwrap();

    let mut request = open_request(&world, alice, a("40"));
    request.swap = MockSwapExecutor::instruction(world.usdt, world.usdc, scenario_borrow(), a("30"));
    let err = world
        .host
        .open_position(world.factory, alice, request)
        .await
        .unwrap_err();
    assert!(matches!(err, ProtocolError::Slippage { .. }));

    let ledger = Address::from_label("sandbox/ledger");
    let (balance, allowance, liquidity, vaults) = world
        .host
        .view(|chain| {
            (
                chain.tokens.balance_of(&world.usdc, &alice),
                chain.tokens.allowance(&world.usdc, &alice, &predicted),
                chain.tokens.balance_of(&world.usdt, &ledger),
                chain.vaults().len(),
            )
        })
        .await;
    assert_eq!(balance, a("1"));
    assert_eq!(allowance, a("1"));
    assert_eq!(liquidity, Amount::from(SANDBOX_LIQUIDITY));
    assert_eq!(vaults, 0);
    assert_eq!(world.host.next_address(&world.factory).await.unwrap(), predicted);
}

#[tokio::test]
async fn test_undercollateralized_open_is_rejected_at_settlement() {
    let world = setup().await;
    let alice = Address::from_label("alice");
    fund(&world, alice, a("1")).await;
    let predicted = world.host.next_address(&world.factory).await.unwrap();
    world.host.approve(world.usdc, alice, predicted, a("1")).await.unwrap();

    let borrow = a("100");
    let request = OpenPosition {
        borrow_amount: borrow,
        target_collateral: a("0"),
        swap: MockSwapExecutor::instruction(world.usdt, world.usdc, borrow, a("0")),
        ..open_request(&world, alice, a("0"))
    };
    let err = world
        .host
        .open_position(world.factory, alice, request)
        .await
        .unwrap_err();
    assert!(matches!(err, ProtocolError::Ledger(_)));
    assert!(world.host.view(|chain| chain.vaults().is_empty()).await);
}

#[tokio::test]
async fn test_close_full_zeroes_position_and_cannot_repeat() {
    let world = setup().await;
    let alice = Address::from_label("alice");
    let vault = open_scenario(&world, alice).await;

    let executor = world.host.view(|chain| chain.executor.clone()).await;
    let source = MockRouteSource::new(executor);
    let view = world
        .host
        .list_positions(&alice, &world.factory)
        .await
        .unwrap()
        .remove(0);
    let swap = plan_close_full(&source, &view, 50).await.unwrap();

    let receipt = world
        .host
        .close_full(vault, alice, swap.clone())
        .await
        .unwrap();
    assert_eq!(receipt.value.repaid, scenario_borrow());

    let (collateral, debt, state, owner_usdc, owner_usdt) = world
        .host
        .view(|chain| {
            (
                chain.ledger.collateral_balance(&vault, &world.usdc),
                chain.ledger.debt_balance(&vault, &world.usdt),
                chain.vault(&vault).map(|v| v.state()),
                chain.tokens.balance_of(&world.usdc, &alice),
                chain.tokens.balance_of(&world.usdt, &alice),
            )
        })
        .await;
    assert!(collateral.is_zero());
    assert!(debt.is_zero());
    assert_eq!(state, Ok(VaultState::Closed));
    // 1:1 round trip: the owner ends with the deposit split across both assets.
    assert_eq!(owner_usdc.checked_add(owner_usdt), Some(a("1")));

    let err = world.host.close_full(vault, alice, swap).await.unwrap_err();
    assert!(matches!(
        err,
        ProtocolError::InvalidState {
            state: VaultState::Closed,
            ..
        }
    ));
}

#[tokio::test]
async fn test_close_full_after_interest_needs_bigger_swap() {
    let world = setup().await;
    let alice = Address::from_label("alice");
    let vault = open_scenario(&world, alice).await;
    let usdt = world.usdt;
    world
        .host
        .transact("accrue", move |chain: &mut SandboxChain| {
            Ok(chain.ledger.accrue_interest(&usdt, Decimal::new(1, 2))?)
        })
        .await
        .unwrap();

    let stale = MockSwapExecutor::instruction(world.usdc, world.usdt, scenario_borrow(), scenario_borrow());
    let err = world.host.close_full(vault, alice, stale).await.unwrap_err();
    assert!(matches!(err, ProtocolError::InsufficientRepayment { .. }));

    let executor = world.host.view(|chain| chain.executor.clone()).await;
    let view = world
        .host
        .list_positions(&alice, &world.factory)
        .await
        .unwrap()
        .remove(0);
    let swap = plan_close_full(&MockRouteSource::new(executor), &view, 50)
        .await
        .unwrap();
    world.host.close_full(vault, alice, swap).await.unwrap();
    let debt = world
        .host
        .view(|chain| chain.ledger.debt_balance(&vault, &world.usdt))
        .await;
    assert!(debt.is_zero());
}

#[tokio::test]
async fn test_close_partial_keeps_position_open() {
    let world = setup().await;
    let alice = Address::from_label("alice");
    let vault = open_scenario(&world, alice).await;
    let executor = world.host.view(|chain| chain.executor.clone()).await;
    let before = world
        .host
        .list_positions(&alice, &world.factory)
        .await
        .unwrap()
        .remove(0);

    let plan = plan_close_partial(&MockRouteSource::new(executor), &before, a("10"), 0)
        .await
        .unwrap();
    let receipt = world
        .host
        .close_partial(vault, alice, plan.repay_amount, a("0.5"), plan.swap)
        .await
        .unwrap();

    assert_eq!(receipt.value.repaid, a("10"));
    assert_eq!(
        receipt.value.debt_balance,
        before.debt_balance.checked_sub(a("10")).unwrap()
    );
    assert_eq!(
        receipt.value.collateral_balance,
        before.collateral_balance.checked_sub(a("10.5")).unwrap()
    );
    let after = world
        .host
        .list_positions(&alice, &world.factory)
        .await
        .unwrap()
        .remove(0);
    assert_eq!(after.state, VaultState::Open);
    assert_eq!(
        world.host.view(|chain| chain.tokens.balance_of(&world.usdc, &alice)).await,
        a("0.5")
    );
}

#[tokio::test]
async fn test_only_owner_may_close() {
    let world = setup().await;
    let alice = Address::from_label("alice");
    let vault = open_scenario(&world, alice).await;
    let swap = MockSwapExecutor::instruction(world.usdc, world.usdt, a("1"), a("1"));

    let err = world
        .host
        .close_partial(vault, Address::from_label("mallory"), a("1"), a("0"), swap)
        .await
        .unwrap_err();
    assert!(matches!(err, ProtocolError::Authorization { .. }));

    let unknown = Address::from_label("nowhere");
    let err = world
        .host
        .close_full(unknown, alice, MockSwapExecutor::instruction(world.usdc, world.usdt, a("1"), a("1")))
        .await
        .unwrap_err();
    assert_eq!(err, ProtocolError::UnknownVault(unknown));
}

#[tokio::test]
async fn test_lens_lists_only_owner_positions_in_order() {
    let world = setup().await;
    let alice = Address::from_label("alice");
    let bob = Address::from_label("bob");
    let first = open_scenario(&world, alice).await;
    let _bobs = open_scenario(&world, bob).await;
    let second = open_scenario(&world, alice).await;

    let views = world
        .host
        .list_positions(&alice, &world.factory)
        .await
        .unwrap();
    let vaults: Vec<Address> = views.iter().map(|v| v.vault).collect();
    assert_eq!(vaults, vec![first, second]);
    assert!(views.iter().all(|v| v.owner == alice && v.state == VaultState::Open));
    assert!(views.iter().all(|v| v.collateral_token.is_some() && v.debt_token.is_some()));
    assert_eq!(views[0].nonce, 0);
    assert_eq!(views[1].nonce, 2);

    let unknown = Address::from_label("no-factory");
    assert_eq!(
        world.host.list_positions(&alice, &unknown).await,
        Err(ProtocolError::UnknownFactory(unknown))
    );
}
