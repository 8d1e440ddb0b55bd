use std::sync::Arc;

use chrono::{Duration, Utc};
use futures_util::future::join_all;
use storefront_engine::{
    db_types::{NewCoupon, Vnd},
    CouponApi,
    LedgerError,
};

mod support;

use support::prepare_env::prepare_test_env;

#[tokio::test]
async fn create_and_redeem() {
    let env = prepare_test_env().await;
    let api = CouponApi::new(env.db.clone());
    let coupon = api
        .create_coupon(NewCoupon::percentage(" tet2027 ", 20).with_max_discount(Vnd::from(30_000)))
        .await
        .unwrap();
    assert_eq!(coupon.code, "TET2027");
    assert_eq!(coupon.used_count, 0);
    let r = api.validate_and_consume("tet2027", Vnd::from(100_000)).await.unwrap();
    assert_eq!(r.discount, Vnd::from(20_000));
    assert_eq!(r.final_total, Vnd::from(80_000));
    let r = api.validate_and_consume("TET2027", Vnd::from(500_000)).await.unwrap();
    assert_eq!(r.discount, Vnd::from(30_000));
    assert_eq!(r.final_total, Vnd::from(470_000));
    assert_eq!(api.fetch_coupon("Tet2027").await.unwrap().used_count, 2);

    let fixed = api.create_coupon(NewCoupon::fixed("FLAT50", Vnd::from(50_000))).await.unwrap();
    assert_eq!(fixed.discount_for(Vnd::from(20_000)), Vnd::from(20_000));
    let r = api.validate_and_consume("flat50", Vnd::from(20_000)).await.unwrap();
    assert_eq!(r.final_total, Vnd::from(0));
}

#[tokio::test]
async fn invalid_coupons_are_refused() {
    let env = prepare_test_env().await;
    let api = CouponApi::new(env.db.clone());
    let err = api.create_coupon(NewCoupon::percentage("BIG", 150)).await.unwrap_err();
    assert!(matches!(err, LedgerError::ValidationError(_)));
    let err = api.create_coupon(NewCoupon::fixed("NOTHING", Vnd::from(0))).await.unwrap_err();
    assert!(matches!(err, LedgerError::ValidationError(_)));
    let err = api.create_coupon(NewCoupon::percentage("", 10)).await.unwrap_err();
    assert!(matches!(err, LedgerError::ValidationError(_)));
    api.create_coupon(NewCoupon::percentage("ONCE", 10)).await.unwrap();
    let err = api.create_coupon(NewCoupon::percentage("once", 5)).await.unwrap_err();
    assert!(matches!(err, LedgerError::ValidationError(_)));
}

#[tokio::test]
async fn coupon_conditions() {
    let env = prepare_test_env().await;
    let api = CouponApi::new(env.db.clone());
    let now = Utc::now();
    api.create_coupon(NewCoupon::percentage("MIN", 10).with_min_order(Vnd::from(200_000))).await.unwrap();
    api.create_coupon(NewCoupon::percentage("LATER", 10).with_validity(Some(now + Duration::days(1)), None))
        .await
        .unwrap();
    let (start, expiry) = (now - Duration::days(10), now - Duration::days(1));
    let old = NewCoupon::percentage("OLD", 10).with_validity(Some(start), Some(expiry));
    api.create_coupon(old).await.unwrap();
    api.create_coupon(NewCoupon::percentage("OFF", 10)).await.unwrap();
    api.deactivate("off").await.unwrap();

    for code in ["MIN", "LATER", "OLD", "OFF"] {
        let err = api.validate_and_consume(code, Vnd::from(100_000)).await.unwrap_err();
        assert!(matches!(err, LedgerError::CouponNotApplicable { .. }), "{code}: {err}");
        assert_eq!(api.fetch_coupon(code).await.unwrap().used_count, 0);
    }
    let err = api.validate_and_consume("NOPE", Vnd::from(100_000)).await.unwrap_err();
    assert!(matches!(err, LedgerError::CouponNotFound(_)));

    api.activate("OFF").await.unwrap();
    assert!(api.validate_and_consume("OFF", Vnd::from(100_000)).await.is_ok());
    assert!(api.validate_and_consume("MIN", Vnd::from(200_000)).await.is_ok());
}

#[tokio::test]
async fn ceiling_holds_under_contention() {
    const MAX_USES: i64 = 5;
    const EXTRA: usize = 15;
    let env = prepare_test_env().await;
    let api = Arc::new(CouponApi::new(env.db.clone()));
    api.create_coupon(NewCoupon::percentage("FLASH", 50).with_max_uses(MAX_USES)).await.unwrap();
    let attempts = (0..MAX_USES as usize + EXTRA).map(|_| {
        let api = api.clone();
        async move { api.validate_and_consume("FLASH", Vnd::from(100_000)).await }
    });
    let results = join_all(attempts).await;
    let ok = results.iter().filter(|r| r.is_ok()).count();
    let exhausted = results.iter().filter(|r| matches!(r, Err(LedgerError::ResourceExhausted(_)))).count();
    assert_eq!(ok, MAX_USES as usize);
    assert_eq!(exhausted, EXTRA);
    let coupon = api.fetch_coupon("FLASH").await.unwrap();
    assert_eq!(coupon.used_count, MAX_USES);
    assert!(coupon.is_exhausted());
}
