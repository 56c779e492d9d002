// tests/mileage.rs
mod common;

use biblebot::engine::{login, scrape_general};
use biblebot::sites::mileage::{Login, Search, Statement};
use biblebot::sites::mileage_params::SearchParams;
use biblebot::{Cookies, RequestOptions};

use common::{client, dated, form, page, DATE_EPOCH};

fn session() -> Cookies {
    [("JSESSIONID".to_string(), "j1".to_string())].into_iter().collect()
}

#[tokio::test]
async fn login_skips_verification_and_sends_referer() {
    let body = "<script>top.location.replace('/mobile/login/main.jsp?appfg=web');</script>";
    let (client, backend) = client([dated(200, body, &[("JSESSIONID", "j1")])]);
    let out = login(&Login, &client, "kbu01", "pw", &RequestOptions::default()).await.unwrap();

    let data = out.data().unwrap();
    assert_eq!(data.iat, DATE_EPOCH);
    assert_eq!(data.cookies, session());

    let sent = backend.requests().remove(0);
    assert!(!sent.verify);
    assert!(sent.headers.get("referer").is_some_and(|r| r.contains("login_form.jsp")));
    let f = form(&sent).unwrap();
    assert_eq!(f["user_pwd"], "pw");
    assert_eq!(f["AutoFg"], "M");
}

#[tokio::test]
async fn search_by_student_id() {
    let mut params = SearchParams::default();
    params.set_student_id("201912345").set_req("CST_NO|CST_NM|CST_CARD_NO");
    let (client, backend) = client([page(
        200,
        r#"<SHEET><DATA><TR><TD>77</TD><TD>홍길동</TD><TD>201912345</TD></TR></DATA>
           <ETC KEY="total_rows">1</ETC></SHEET>"#,
    )]);
    let out = scrape_general(&Search::new(params), &client, &session(), &RequestOptions::default())
        .await
        .unwrap();

    let d = out.data().unwrap();
    assert_eq!(d.head, vec!["회원번호", "회원명", "카드번호"]);
    assert_eq!(d.body, vec![vec!["77", "홍길동", "201912345"]]);
    assert_eq!(out.meta()["total_size"], "1");

    let sent = backend.requests().remove(0);
    assert!(sent.url.ends_with("/ddd.sheetAction"));
    assert!(!sent.verify);
    assert_eq!(sent.cookies, session());
    assert_eq!(form(&sent).unwrap()["CST_CARD_NO"], "201912345");
}

#[tokio::test]
async fn statement_for_customer() {
    let (client, backend) = client([page(
        200,
        r#"<SHEET><DATA>
             <TR><TD>2019-09-01</TD><TD>2019-09-01</TD><TD>5</TD><TD>-300</TD><TD></TD></TR>
           </DATA><ETC KEY="total_rows">1</ETC></SHEET>"#,
    )]);
    let out = scrape_general(&Statement::for_customer("77"), &client, &session(), &RequestOptions::default())
        .await
        .unwrap();
    assert_eq!(out.data().unwrap().body[0][2], "사용");
    assert_eq!(form(&backend.requests()[0]).unwrap()["CST_NO"], "77");
}

#[tokio::test]
async fn expired_session_message() {
    let (client, _) = client([page(200, "<SHEET><MESSAGE>세션정보가 없습니다.</MESSAGE></SHEET>")]);
    let out = scrape_general(&Search::default(), &client, &session(), &RequestOptions::default())
        .await
        .unwrap();
    assert_eq!(out.error().unwrap().title(), "마일리지 세션이 만료되었습니다.");
}
